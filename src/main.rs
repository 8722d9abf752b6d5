#[tokio::main]
async fn main() -> anyhow::Result<()> {
    activity_recognition_lib::run().await
}
