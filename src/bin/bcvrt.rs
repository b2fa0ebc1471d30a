use std::env;
use std::ffi::OsString;
use std::process::exit;

use bunker_convert_sdk::Client;

fn main() {
    let args: Vec<OsString> = env::args_os().skip(1).collect();

    let client = Client::from_env();
    match client.passthrough(args) {
        Ok(result) => {
            if result.code != 0 {
                exit(if result.code > 0 { result.code } else { 1 });
            }
        }
        Err(err) => {
            eprintln!("Failed to invoke {}: {err}", client.config().binary);
            exit(1);
        }
    }
}
