fn main() -> anyhow::Result<()> {
    olap_cli::cli::run()
}
