use mastodon_status_http::MastodonClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = MastodonClient::from_env().map_err(anyhow::Error::msg)?;

    let post = client.create("Hello from Rust").await?;
    println!("created {} at {:?}", post.id, post.created_at);

    let fetched = client.retrieve(&post.id).await?;
    println!("{}", fetched.content);

    client.delete(&post.id).await?;
    println!("deleted {}", post.id);

    Ok(())
}
