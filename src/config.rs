// ABOUTME: Version info, welcome banner and REPL help text

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "eloquent 0.1.0";
pub const WELCOME_SUBTITLE: &str = "a small Lisp: tagged values, bytecode, a stack VM";
pub const WELCOME_FOOTER: &str = "(quit) or Ctrl-D to exit";

pub const HELP_TEXT: &str = r#"
Available REPL commands:
  (quit) or (exit)     - Exit the REPL
  (clear)              - Clear the screen

Type any expression to read, compile and run it.
"#;
