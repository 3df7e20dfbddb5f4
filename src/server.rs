//! MCP Server implementation
//!
//! This module implements the Model Context Protocol server that exposes
//! desktop automation tools to AI assistants. Every tool is a thin wrapper
//! around [`Desktop`]; failures come back as `CallToolResult::error` with a
//! JSON body naming the error kind.

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, serde,
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use serde_json::json;
use std::sync::Arc;

use crate::backend::Point;
use crate::core::errors::DesktopError;
use crate::desktop::Desktop;
use crate::input::MouseButton;
use crate::screenshot::{ScreenshotRequest, ScreenshotResult};

/// Parameters for tools that act on a screen position
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct PointParams {
    /// X coordinate in screen pixels
    pub x: i32,
    /// Y coordinate in screen pixels
    pub y: i32,
}

/// Parameters for drag_mouse tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DragParams {
    /// Starting X coordinate
    pub from_x: i32,
    /// Starting Y coordinate
    pub from_y: i32,
    /// Ending X coordinate
    pub to_x: i32,
    /// Ending Y coordinate
    pub to_y: i32,
    /// Duration of the drag in seconds
    #[serde(default = "default_drag_duration")]
    pub duration: f64,
}

fn default_drag_duration() -> f64 {
    0.5
}

/// Parameters for type_text tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct TypeTextParams {
    /// Text to type at the current cursor position
    pub text: String,
}

/// Parameters for press_key tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct PressKeyParams {
    /// Key to press (e.g., "enter", "esc", "f5", "a") or a combination like "ctrl+c"
    pub key: String,
}

/// Parameters for take_screenshot tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct TakeScreenshotParams {
    /// Pattern to match the window title; omit to capture the entire screen
    #[serde(default)]
    pub title_pattern: Option<String>,
    /// Treat the pattern as a regular expression instead of fuzzy matching
    #[serde(default)]
    pub use_regex: bool,
    /// Minimum fuzzy match score (0-100)
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Also return OCR text with absolute screen coordinates
    #[serde(default)]
    pub with_ocr_text_and_coords: bool,
    /// Percentage to scale the image by before OCR (lower is faster)
    #[serde(default = "default_ocr_scale")]
    pub scale_percent_for_ocr: u32,
    /// Save the screenshot to the downloads directory
    #[serde(default)]
    pub save_to_downloads: bool,
}

fn default_threshold() -> u8 {
    60
}

fn default_ocr_scale() -> u32 {
    100
}

/// Parameters for activate_window tool
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ActivateWindowParams {
    /// Pattern to match the window title
    pub title_pattern: String,
    /// Treat the pattern as a regular expression instead of fuzzy matching
    #[serde(default)]
    pub use_regex: bool,
    /// Minimum fuzzy match score (0-100)
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn json_result(value: serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(pretty(&value))])
}

fn error_result(context: &str, err: &DesktopError) -> CallToolResult {
    tracing::warn!("{}: {}", context, err);
    CallToolResult::error(vec![Content::text(
        json!({
            "error": context,
            "kind": err.kind(),
            "details": err.to_string()
        })
        .to_string(),
    )])
}

/// Image content followed by a JSON description of what was captured
pub fn screenshot_contents(shot: &ScreenshotResult) -> Vec<Content> {
    let base64_data =
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &shot.image.png);

    let mut metadata = json!({
        "width": shot.image.width,
        "height": shot.image.height,
        "scale": shot.image.scale,
        "size_bytes": shot.image.png.len(),
        "region": shot.region,
        "window": shot.window,
        "limitations": shot.limitations,
    });
    if let Some(path) = &shot.saved_path {
        metadata["file_path"] = json!(path.to_string_lossy());
    }
    if let Some(fragments) = &shot.fragments {
        metadata["ocr"] = json!(fragments);
    }

    vec![
        Content::image(base64_data, "image/png"),
        Content::text(pretty(&metadata)),
    ]
}

/// Computer use MCP Server
///
/// Provides mouse, keyboard, screenshot, OCR and window tools for AI assistants.
#[derive(Clone)]
pub struct ComputerUseServer {
    desktop: Arc<Desktop>,
    /// MCP tool router
    tool_router: ToolRouter<ComputerUseServer>,
}

#[tool_router]
impl ComputerUseServer {
    pub fn new(desktop: Arc<Desktop>) -> Self {
        Self {
            desktop,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the version of the tool")]
    async fn tool_version(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(env!("CARGO_PKG_VERSION"))]))
    }

    #[tool(description = "Click at the specified screen coordinates")]
    async fn click_screen(&self, params: Parameters<PointParams>) -> Result<CallToolResult, McpError> {
        self.click(params.0, MouseButton::Left).await
    }

    #[tool(description = "Right-click at the specified screen coordinates")]
    async fn right_click(&self, params: Parameters<PointParams>) -> Result<CallToolResult, McpError> {
        self.click(params.0, MouseButton::Right).await
    }

    #[tool(description = "Move the mouse to the specified screen coordinates")]
    async fn move_mouse(&self, params: Parameters<PointParams>) -> Result<CallToolResult, McpError> {
        let PointParams { x, y } = params.0;
        match self.desktop.move_mouse(x, y).await {
            Ok(()) => Ok(json_result(json!({
                "success": true,
                "message": format!("Moved mouse to ({}, {})", x, y)
            }))),
            Err(e) => Ok(error_result(&format!("Failed to move mouse to ({}, {})", x, y), &e)),
        }
    }

    #[tool(description = "Drag the mouse from one position to another over the given duration in seconds")]
    async fn drag_mouse(&self, params: Parameters<DragParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let from = Point { x: p.from_x, y: p.from_y };
        let to = Point { x: p.to_x, y: p.to_y };

        match self.desktop.drag_mouse(from, to, p.duration).await {
            Ok(()) => Ok(json_result(json!({
                "success": true,
                "from": from,
                "to": to,
                "duration": p.duration,
                "message": format!("Dragged from ({}, {}) to ({}, {})", from.x, from.y, to.x, to.y)
            }))),
            Err(e) => Ok(error_result("Failed to drag mouse", &e)),
        }
    }

    #[tool(description = "Type the specified text at the current cursor position")]
    async fn type_text(&self, params: Parameters<TypeTextParams>) -> Result<CallToolResult, McpError> {
        match self.desktop.type_text(&params.0.text).await {
            Ok(()) => Ok(json_result(json!({
                "success": true,
                "text_length": params.0.text.chars().count()
            }))),
            Err(e) => Ok(error_result("Failed to type text", &e)),
        }
    }

    #[tool(description = "Press a keyboard key or key combination (e.g. \"enter\", \"ctrl+c\")")]
    async fn press_key(&self, params: Parameters<PressKeyParams>) -> Result<CallToolResult, McpError> {
        match self.desktop.press_key(&params.0.key).await {
            Ok(_) => Ok(json_result(json!({
                "success": true,
                "key": params.0.key
            }))),
            Err(e) => Ok(error_result(&format!("Failed to press key {}", params.0.key), &e)),
        }
    }

    #[tool(description = "Get the current screen resolution")]
    async fn get_screen_size(&self) -> Result<CallToolResult, McpError> {
        match self.desktop.screen_size().await {
            Ok(size) => Ok(json_result(json!({
                "width": size.width,
                "height": size.height,
                "message": format!("Screen size: {}x{}", size.width, size.height)
            }))),
            Err(e) => Ok(error_result("Failed to get screen size", &e)),
        }
    }

    #[tool(description = "Get the current mouse position")]
    async fn get_mouse_position(&self) -> Result<CallToolResult, McpError> {
        match self.desktop.mouse_position().await {
            Ok(point) => Ok(json_result(json!({
                "x": point.x,
                "y": point.y,
                "message": format!("Mouse position: ({}, {})", point.x, point.y)
            }))),
            Err(e) => Ok(error_result("Failed to get mouse position", &e)),
        }
    }

    #[tool(description = "Take a screenshot of the entire screen or of the window best matching title_pattern. \
                          Optionally returns OCR text with absolute screen coordinates and saves the image \
                          to the downloads directory. Images are downscaled to fit a 1 MB response budget.")]
    async fn take_screenshot(
        &self,
        params: Parameters<TakeScreenshotParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let request = ScreenshotRequest {
            title_pattern: p.title_pattern.filter(|t| !t.is_empty()),
            use_regex: p.use_regex,
            threshold: p.threshold,
            with_ocr: p.with_ocr_text_and_coords,
            ocr_scale_percent: p.scale_percent_for_ocr,
            save_to_downloads: p.save_to_downloads,
        };

        match self.desktop.take_screenshot(&request).await {
            Ok(shot) => Ok(CallToolResult::success(screenshot_contents(&shot))),
            Err(e) => Ok(error_result("Failed to take screenshot", &e)),
        }
    }

    #[tool(description = "List all open windows with their titles, bounds and which one is active")]
    async fn list_windows(&self) -> Result<CallToolResult, McpError> {
        match self.desktop.list_windows().await {
            Ok(windows) => Ok(json_result(json!({
                "windows": windows,
                "count": windows.len()
            }))),
            Err(e) => Ok(error_result("Failed to list windows", &e)),
        }
    }

    #[tool(description = "Get the title of the currently active window")]
    async fn get_active_window(&self) -> Result<CallToolResult, McpError> {
        match self.desktop.active_window().await {
            Ok(Some(window)) => Ok(json_result(json!({
                "title": window.title,
                "window": window
            }))),
            Ok(None) => Ok(json_result(json!({
                "title": null,
                "message": "No active window reported"
            }))),
            Err(e) => Ok(error_result("Failed to get active window", &e)),
        }
    }

    #[tool(description = "Activate a window (bring it to the foreground) by matching its title")]
    async fn activate_window(
        &self,
        params: Parameters<ActivateWindowParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        match self
            .desktop
            .activate_window(&p.title_pattern, p.use_regex, p.threshold)
            .await
        {
            Ok(activation) => {
                let title = &activation.window.window.title;
                let message = if activation.already_active {
                    format!("Window '{}' is already active", title)
                } else if activation.limitations.is_empty() {
                    format!("Activated window '{}'", title)
                } else {
                    format!("Found window '{}' but could not activate it on this platform", title)
                };
                Ok(json_result(json!({
                    "success": true,
                    "message": message,
                    "activation": activation
                })))
            }
            Err(e) => Ok(error_result(
                &format!("Failed to activate window matching '{}'", p.title_pattern),
                &e,
            )),
        }
    }
}

impl ComputerUseServer {
    async fn click(&self, params: PointParams, button: MouseButton) -> Result<CallToolResult, McpError> {
        let PointParams { x, y } = params;
        match self.desktop.click(x, y, button).await {
            Ok(()) => Ok(json_result(json!({
                "success": true,
                "button": button,
                "message": format!("Clicked at ({}, {})", x, y)
            }))),
            Err(e) => Ok(error_result(&format!("Failed to click at ({}, {})", x, y), &e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for ComputerUseServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Desktop automation tools. Use take_screenshot (optionally with OCR) to see the screen, \
                 then click_screen, type_text and press_key to act. Coordinates are absolute screen pixels; \
                 list_windows and activate_window manage windows by title.".to_string()
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        Ok(self.get_info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockDesktop, MockRecognizer};
    use crate::screenshot::ScreenshotService;
    use crate::screenshot::compress::CompressionPolicy;
    use std::time::Duration;

    fn server() -> (ComputerUseServer, Arc<MockDesktop>) {
        let mock = Arc::new(MockDesktop::new());
        let screenshots = ScreenshotService::new(
            mock.clone(),
            mock.clone(),
            Arc::new(MockRecognizer::default()),
            CompressionPolicy::default(),
            std::env::temp_dir(),
        )
        .with_settle_delays(Duration::ZERO, Duration::ZERO);
        let desktop = Desktop::new(mock.clone(), mock.clone(), screenshots);
        (ComputerUseServer::new(Arc::new(desktop)), mock)
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_click_screen_reports_success() {
        let (server, mock) = server();
        let result = server
            .click_screen(Parameters(PointParams { x: 10, y: 20 }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(mock.events().clicks, vec![(Point { x: 10, y: 20 }, MouseButton::Left)]);
    }

    #[tokio::test]
    async fn test_out_of_range_click_is_tool_error() {
        let (server, mock) = server();
        let result = server
            .right_click(Parameters(PointParams { x: 5000, y: 20 }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("invalid_argument"));
        assert!(mock.events().clicks.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_tool_error() {
        let (server, _) = server();
        let result = server
            .press_key(Parameters(PressKeyParams {
                key: "hyper+q".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_take_screenshot_returns_image_then_metadata() {
        let (server, _) = server();
        let result = server
            .take_screenshot(Parameters(TakeScreenshotParams {
                title_pattern: None,
                use_regex: false,
                threshold: 60,
                with_ocr_text_and_coords: false,
                scale_percent_for_ocr: 100,
                save_to_downloads: false,
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 2);
        assert!(result.content[0].as_image().is_some());
        assert!(text_of(&result).contains("\"width\": 1280"));
    }

    #[tokio::test]
    async fn test_activate_missing_window_is_not_found() {
        let (server, _) = server();
        let result = server
            .activate_window(Parameters(ActivateWindowParams {
                title_pattern: "Spreadsheet".to_string(),
                use_regex: false,
                threshold: 60,
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("not_found"));
    }

    #[test]
    fn test_drag_duration_defaults() {
        let params: DragParams =
            serde_json::from_value(json!({"from_x": 0, "from_y": 0, "to_x": 1, "to_y": 1})).unwrap();
        assert_eq!(params.duration, 0.5);
    }

    #[test]
    fn test_screenshot_params_defaults() {
        let params: TakeScreenshotParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.threshold, 60);
        assert_eq!(params.scale_percent_for_ocr, 100);
        assert!(params.title_pattern.is_none());
    }
}
