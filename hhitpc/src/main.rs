fn main() -> anyhow::Result<()> {
    hhitpc::cli::run_cli()
}
