//! chroma-provisioner - single-node Chroma stack provisioning.

use chroma_provisioner::cli::{exit_code_for, Cli};
use chroma_provisioner::config::init_logging;
use chroma_provisioner::ProvisionError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("Error: failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli.run().await {
        match e.chain().find_map(|cause| cause.downcast_ref::<ProvisionError>()) {
            Some(provision_error) => eprintln!("Error: {}", provision_error.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(exit_code_for(&e));
    }
}
