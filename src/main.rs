//! otreplay CLI entry point.

use otreplay_lib::cli::{self, Cli};
use otreplay_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the replay
    cli::execute(cli).await
}
