// SPDX-License-Identifier: MPL-2.0

use touchline::backend::{Post, Social};
use touchline::state::AppSettings;
use touchline::{TouchlineApp, runtime};

fn describe(post: &Post) -> String {
    let body = match post {
        Post::Text(text) => text.content.clone(),
        Post::Pick(pick) if pick.is_parlay() => {
            format!("{}-leg parlay @ {:.2}", pick.legs.len(), pick.total_odds())
        }
        Post::Pick(pick) => format!("pick @ {:.2}", pick.total_odds()),
    };
    format!(
        "@{}: {} [{} likes, {} reposts]",
        post.author().username,
        body,
        post.likes(),
        post.reposts()
    )
}

fn main() {
    touchline::init_tracing();

    let settings = AppSettings::load();
    let app = match TouchlineApp::from_settings(settings) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Invalid backend configuration: {e}");
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = runtime::block_on(async {
        match args.as_slice() {
            [email, password] => app.login(email, password).await.map_err(|e| e.to_string())?,
            _ => app.restore_saved().await.map_err(|e| e.to_string())?,
        };
        app.open_feed().await.map_err(|e| e.to_string())
    });

    match result {
        Ok(feed) => feed.read(|v| {
            for post in v.posts() {
                println!("{}", describe(post));
            }
        }),
        Err(e) => {
            eprintln!("Could not load feed: {e}");
            eprintln!("Usage: touchline [EMAIL PASSWORD]");
            std::process::exit(1);
        }
    }
}
