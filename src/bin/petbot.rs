use anyhow::Result;

fn main() -> Result<()> {
    pet_vision::cli::run()
}
