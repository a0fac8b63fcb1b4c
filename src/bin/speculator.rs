fn main() -> anyhow::Result<()> {
    speculator::cli::run_cli()
}
