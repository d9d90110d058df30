use std::process;
use std::sync::Arc;

use clap::Parser;

use udprobe::{
    ClientSupervisor, Config, Role, ShutdownSignal, ShutdownState, UdpServer,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let shutdown = Arc::new(ShutdownSignal::new());

    // First interrupt begins cooperative shutdown, a second one ends the
    // process without waiting for the workers.
    let signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || match signal.request_stop() {
        ShutdownState::Forced => {
            println!("Force exit.");
            process::exit(0);
        }
        _ => println!("Exiting."),
    }) {
        log::error!("failed to register signal handler: {e}");
        process::exit(1);
    }

    let result = match config.role() {
        Role::Server(addr) => {
            UdpServer::new(addr, config.ack, shutdown).map(|mut server| server.run())
        }
        Role::Client(peer) => ClientSupervisor::new(
            peer,
            config.mtu as usize,
            config.parallel as usize,
            config.time,
            shutdown,
        )
        .run(),
    };

    if let Err(e) = result {
        log::error!("{e}");
        process::exit(1);
    }
}
