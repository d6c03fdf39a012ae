fn main() -> anyhow::Result<()> {
    reclaimer_cli::run_cli()
}
