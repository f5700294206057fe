//! Reference runner: `appdeck-runner <execution_id> <true|false>`, with the
//! unpacked application directory as the working directory.

use std::env;
use std::process::ExitCode;

use appdeck_controls::Registry;
use appdeck_executor::content::JsonValueEncoder;
use appdeck_executor::execution::ExecutionId;
use appdeck_executor::{runner, samples};

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (id, apply) = match args.as_slice() {
        [id, apply] if apply == "true" || apply == "false" => {
            (ExecutionId::new(id.clone()), apply == "true")
        }
        _ => {
            eprintln!("usage: appdeck-runner <execution_id> <true|false>");
            return ExitCode::from(2);
        }
    };

    let app_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cannot resolve working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut registry = Registry::with_builtins();
    samples::register(&mut registry);

    runner::run(&registry, &JsonValueEncoder, &app_dir, &id, apply);
    ExitCode::SUCCESS
}
