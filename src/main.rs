use anyhow::Result;

fn main() -> Result<()> {
    reclaimer_cli::run_cli()
}
