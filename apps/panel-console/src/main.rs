use panel_console::terminal::{app, cli};

#[tokio::main]
async fn main() {
    let cli = cli::parse();
    match app::run(cli).await {
        Ok(reason) => std::process::exit(reason.exit_code()),
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}
