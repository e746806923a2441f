// ABOUTME: CLI entry point and REPL loop, a thin front door over eloquent_lisp

use clap::Parser;
use eloquent_lisp::config::{HELP_TEXT, VERSION, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use eloquent_lisp::{self, writer};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "eloquent")]
#[command(version = VERSION)]
#[command(about = "A small Lisp: tagged values, bytecode compiler, stack VM")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Enable the debug diagnostic flag (§5)
    #[arg(long = "debug")]
    debug: bool,

    /// Disable type-checking on primitive calls (§4.5 CHKTYPE)
    #[arg(long = "no-check-types")]
    no_check_types: bool,

    /// Disable exception-checking after primitive calls (§4.5 CHECKEX)
    #[arg(long = "no-check-exceptions")]
    no_check_exceptions: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let ctx = eloquent_lisp::init();
    ctx.debug.set(args.debug);
    if args.no_check_types {
        ctx.check_types.set(false);
    }
    if args.no_check_exceptions {
        ctx.check_exceptions.set(false);
    }

    if let Some(script_path) = args.script {
        run_script(&ctx, &script_path)?;
        return Ok(());
    }

    run_repl(&ctx)
}

/// Execute every form in a script file in sequence; abort on the first
/// raised exception.
fn run_script(
    ctx: &eloquent_lisp::Context,
    path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read script file {}: {}", path.display(), e))?;

    let result = eloquent_lisp::eval(ctx, &contents);
    if result.is_signalled_exception() {
        return Err(format!("Unhandled exception: {}", writer::write_to_string(&result)).into());
    }
    Ok(())
}

fn run_repl(ctx: &eloquent_lisp::Context) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = DefaultEditor::with_config(config)
        .map_err(|e| format!("Failed to initialize REPL: {}", e))?;

    let history_file = ".eloquent_history";
    let _ = rl.load_history(history_file);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    loop {
        let readline = rl.readline("eloquent> ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                match line.trim() {
                    "(quit)" | "(exit)" => {
                        println!("Goodbye!");
                        break;
                    }
                    "(clear)" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    "(help)" => {
                        println!("{}", HELP_TEXT);
                        continue;
                    }
                    _ => {}
                }

                let result = eloquent_lisp::eval(ctx, &line);
                println!("=> {}", writer::write_to_string(&result));
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_args_default_to_no_flags() {
        let args = CliArgs::parse_from(["eloquent"]);
        assert!(args.script.is_none());
        assert!(!args.debug);
        assert!(!args.no_check_types);
        assert!(!args.no_check_exceptions);
    }

    #[test]
    fn cli_args_parse_script_path_and_flags() {
        let args = CliArgs::parse_from(["eloquent", "--debug", "run.lisp"]);
        assert_eq!(args.script, Some(PathBuf::from("run.lisp")));
        assert!(args.debug);
    }
}
