//! Debug script to inspect an embed page with a real browser
//!
//! Usage: cargo run --example debug_embed_page -- https://embed69.org/f/tt0137523/

use std::error::Error;
use std::time::Duration;

use embedlinks_core::parser::embed::{filter_embeds, parse_data_link};
use embedlinks_core::parser::page::find_not_found_marker;
use embedlinks_core::{ChromiumLauncher, EmbedSession, SessionFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://embed69.org/f/tt0137523/".to_string());

    println!("Opening {}...\n", url);

    let session = ChromiumLauncher::default().open().await?;
    let result = inspect(session.as_ref(), &url).await;

    // The browser process must go away whether or not inspection failed
    if let Err(e) = session.close().await {
        eprintln!("closing browser failed: {}", e);
    }
    result
}

async fn inspect(session: &dyn EmbedSession, url: &str) -> Result<(), Box<dyn Error>> {
    session.navigate(url, Duration::from_secs(30)).await?;

    let html = session.html().await?;
    std::fs::write("debug_embed.html", &html)?;
    println!("HTML saved to debug_embed.html");

    if let Some(marker) = find_not_found_marker(&html) {
        println!("Page reports missing title ({:?})", marker);
        return Ok(());
    }

    if !session
        .wait_for_data(Duration::from_secs(20), Duration::from_millis(250))
        .await?
    {
        println!("dataLink never appeared");
        return Ok(());
    }

    let groups = parse_data_link(session.read_data().await?)?;
    for group in &groups {
        println!("\n=== {} ({} servers) ===", group.language, group.embeds.len());
        for embed in &group.embeds {
            println!("  {:<12} {}", embed.server, embed.link);
        }
    }

    let kept = filter_embeds(groups, &[], "");
    println!("\n{} embeds total", kept.len());
    Ok(())
}
