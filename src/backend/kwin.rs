//! KWin backend for KDE Plasma on Wayland
//!
//! This backend wraps the X11 backend for window enumeration (via XWayland)
//! but uses KWin's D-Bus scripting API for activation, which actually raises
//! windows on Wayland instead of just requesting attention.

use async_trait::async_trait;
use std::sync::Arc;
use zbus::Connection;

use super::{Capabilities, Point, ScreenSize, WindowBackend};
use crate::core::window::{PlatformWindowId, WindowHandle};

const KWIN_SERVICE: &str = "org.kde.KWin";

/// KWin backend that uses D-Bus for focus operations
pub struct KWinBackend {
    /// Wrapped X11 backend for listing and display queries
    x11_backend: Arc<dyn WindowBackend>,
    dbus: Connection,
}

impl KWinBackend {
    pub async fn new(x11_backend: Arc<dyn WindowBackend>) -> anyhow::Result<Self> {
        let dbus = Connection::session().await?;
        Ok(Self { x11_backend, dbus })
    }

    /// Activate the first window whose caption equals `window_title`
    async fn focus_via_kwin(&self, window_title: &str) -> anyhow::Result<()> {
        let script = activation_script(window_title);

        // KWin only loads scripts from a file path
        let script_path = std::env::temp_dir().join(format!(
            "computer_use_focus_{}_{}.js",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&script_path, &script).await?;

        let result = self.run_script(&script_path.to_string_lossy()).await;

        let _ = tokio::fs::remove_file(&script_path).await;
        result
    }

    async fn run_script(&self, script_path: &str) -> anyhow::Result<()> {
        let reply = self
            .dbus
            .call_method(
                Some(KWIN_SERVICE),
                "/Scripting",
                Some("org.kde.kwin.Scripting"),
                "loadScript",
                &(script_path,),
            )
            .await?;

        let script_id: i32 = reply.body().deserialize()?;
        if script_id < 0 {
            anyhow::bail!("KWin refused to load activation script");
        }

        let mut last_err = None;
        let mut loaded_at = None;
        for path in script_object_paths(script_id) {
            match self
                .dbus
                .call_method(
                    Some(KWIN_SERVICE),
                    path.as_str(),
                    Some("org.kde.kwin.Script"),
                    "run",
                    &(),
                )
                .await
            {
                Ok(_) => {
                    loaded_at = Some(path);
                    break;
                }
                Err(e) => {
                    tracing::debug!("KWin script {} not at {}: {}", script_id, path, e);
                    last_err = Some(e);
                }
            }
        }

        let Some(object_path) = loaded_at else {
            return Err(match last_err {
                Some(e) => e.into(),
                None => anyhow::anyhow!("KWin script {} could not be run", script_id),
            });
        };

        // Let the script execute before unloading it
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        if let Err(e) = self
            .dbus
            .call_method(
                Some(KWIN_SERVICE),
                object_path.as_str(),
                Some("org.kde.kwin.Script"),
                "stop",
                &(),
            )
            .await
        {
            tracing::debug!("Failed to unload KWin script {}: {}", script_id, e);
        }

        Ok(())
    }
}

/// D-Bus object paths a loaded script may live at: Plasma 6, then Plasma 5
fn script_object_paths(script_id: i32) -> [String; 2] {
    [format!("/Scripting/Script{}", script_id), format!("/{}", script_id)]
}

/// KWin script that activates a window by exact caption
///
/// Uses `workspace.windowList()` on Plasma 6 and `clientList()` on Plasma 5.
fn activation_script(window_title: &str) -> String {
    let escaped = window_title
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('\n', "\\n");

    format!(
        r#"
        (function() {{
            var windows = typeof workspace.windowList === 'function'
                ? workspace.windowList()
                : workspace.clientList();
            for (var i = 0; i < windows.length; i++) {{
                var w = windows[i];
                var title = w.caption || w.title || '';
                if (title === '{escaped}') {{
                    workspace.activeWindow = w;
                    workspace.activeClient = w;
                    break;
                }}
            }}
        }})();
        "#
    )
}

#[async_trait]
impl WindowBackend for KWinBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            window_activation: true,
            ..self.x11_backend.capabilities()
        }
    }

    async fn list_windows(&self) -> anyhow::Result<Vec<WindowHandle>> {
        self.x11_backend.list_windows().await
    }

    async fn focus_window(&self, id: &PlatformWindowId) -> anyhow::Result<()> {
        // KWin identifies windows by caption, so resolve the title first
        let windows = self.x11_backend.list_windows().await?;
        let window = windows
            .iter()
            .find(|w| &w.id == id)
            .ok_or_else(|| anyhow::anyhow!("Window {:?} disappeared before activation", id))?;

        match self.focus_via_kwin(&window.title).await {
            Ok(()) => {
                tracing::debug!("Focused window via KWin D-Bus: {}", window.title);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("KWin D-Bus focus failed, falling back to X11: {}", e);
                self.x11_backend.focus_window(id).await
            }
        }
    }

    async fn screen_size(&self) -> anyhow::Result<ScreenSize> {
        self.x11_backend.screen_size().await
    }

    async fn pointer_position(&self) -> anyhow::Result<Point> {
        self.x11_backend.pointer_position().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_paths_cover_both_plasma_versions() {
        assert_eq!(
            script_object_paths(3),
            ["/Scripting/Script3".to_string(), "/3".to_string()]
        );
    }

    #[test]
    fn test_activation_script_escapes_quotes() {
        let script = activation_script(r#"It's "quoted" \ here"#);
        assert!(script.contains(r#"It\'s \"quoted\" \\ here"#));
        assert!(script.contains("workspace.activeWindow = w"));
    }
}
