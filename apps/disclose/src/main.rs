use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = disclose::Args::parse();

	disclose::run(args).await
}
