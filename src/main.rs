fn main() -> anyhow::Result<()> {
    notes_client::cli::run()
}
