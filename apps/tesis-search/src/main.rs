use clap::Parser;

use tesis_search::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	tesis_search::run(args).await
}
