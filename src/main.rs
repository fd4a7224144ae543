#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rocket = yatube::build(yatube::config::figment())?;
    rocket.launch().await?;
    Ok(())
}
