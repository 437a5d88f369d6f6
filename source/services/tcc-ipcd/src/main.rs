// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: tcc-ipcd entrypoint; logging setup and argument forwarding
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let owned: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
    match tcc_ipcd::execute(&refs) {
        Ok(line) => println!("{line}"),
        Err(err) => {
            eprintln!("tcc-ipcd: exited with error: {err}");
            std::process::exit(1);
        }
    }
}
