//! Computer use - desktop automation MCP server for Linux
//!
//! Runs the MCP server on stdio by default. The subcommands drive the same
//! operations once from the shell, which is handy for checking a desktop
//! setup before wiring it into an assistant.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use computer_use_mcp::core::config::{Config, ConfigArgs};
use computer_use_mcp::core::logging::init_logging;
use computer_use_mcp::desktop::Desktop;
use computer_use_mcp::input::MouseButton;
use computer_use_mcp::screenshot::ScreenshotRequest;
use computer_use_mcp::server::ComputerUseServer;
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "computer-use-mcp", version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "COMPUTER_USE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over stdio (default)
    Serve,
    /// Click at screen coordinates
    Click {
        x: i32,
        y: i32,
        #[arg(long)]
        right: bool,
    },
    /// Type text at the cursor
    Type { text: String },
    /// Press a key or combination such as ctrl+c
    Key { key: String },
    /// Capture the screen or a window and print what was captured
    Screenshot {
        /// Window title pattern
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        regex: bool,
        #[arg(long, default_value_t = 60)]
        threshold: u8,
        /// Print OCR lines with screen coordinates
        #[arg(long)]
        ocr: bool,
        #[arg(long, default_value_t = 100)]
        ocr_scale: u32,
        /// Write the PNG here instead of the downloads directory
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Only print the metadata; do not write the PNG anywhere
        #[arg(long, conflicts_with = "output")]
        no_save: bool,
    },
    /// List open windows
    ListWindows,
    /// Print the screen size
    ScreenSize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for MCP and command output
    init_logging(cli.log_json);

    let config = Config::from_args(cli.config)?;
    let desktop = Desktop::connect(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(desktop).await?,
        Command::Click { x, y, right } => {
            let button = if right { MouseButton::Right } else { MouseButton::Left };
            desktop.click(x, y, button).await?;
        }
        Command::Type { text } => desktop.type_text(&text).await?,
        Command::Key { key } => {
            desktop.press_key(&key).await?;
        }
        Command::Screenshot {
            title,
            regex,
            threshold,
            ocr,
            ocr_scale,
            output,
            no_save,
        } => {
            let request = ScreenshotRequest {
                title_pattern: title,
                use_regex: regex,
                threshold,
                with_ocr: ocr,
                ocr_scale_percent: ocr_scale,
                save_to_downloads: output.is_none() && !no_save,
            };
            let mut shot = desktop.take_screenshot(&request).await?;
            if let Some(path) = output {
                tokio::fs::write(&path, &shot.image.png).await?;
                shot.saved_path = Some(path);
            }
            println!("{}", serde_json::to_string_pretty(&shot)?);
        }
        Command::ListWindows => {
            let windows = desktop.list_windows().await?;
            println!("{}", serde_json::to_string_pretty(&windows)?);
        }
        Command::ScreenSize => {
            let size = desktop.screen_size().await?;
            println!("{}", json!({ "width": size.width, "height": size.height }));
        }
    }

    Ok(())
}

async fn serve(desktop: Desktop) -> anyhow::Result<()> {
    tracing::info!("Starting computer use MCP server");

    let server = ComputerUseServer::new(Arc::new(desktop));

    // Run with stdio transport
    let transport = stdio();

    tracing::info!("Computer use MCP server ready, listening on stdio");

    let service = server.serve(transport).await?;

    // Wait for graceful shutdown
    service.waiting().await?;

    tracing::info!("Computer use MCP server shutting down");
    Ok(())
}
