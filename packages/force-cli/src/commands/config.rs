use crate::cli::ConfigArgs;
use crate::exit_codes;
use crate::experiment_params;
use crate::output;

pub fn execute(args: ConfigArgs) -> i32 {
    let config = match experiment_params::resolve_config(&args.experiment) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    match output::to_json(&config, args.compact) {
        Ok(json) => match output::print_json(&json) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit_codes::EXECUTION_ERROR
            }
        },
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
