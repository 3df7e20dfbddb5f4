//! X11 window backend using x11rb

use async_trait::async_trait;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::{Capabilities, Point, ScreenSize, WindowBackend};
use crate::core::window::{Geometry, PlatformWindowId, WindowHandle, normalize_active};

/// X11 window backend
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    atoms: X11Atoms,
    capabilities: Capabilities,
}

/// Cached X11 atoms for efficiency
struct X11Atoms {
    net_supported: Atom,
    net_client_list: Atom,
    net_wm_name: Atom,
    net_active_window: Atom,
    wm_class: Atom,
    wm_name: Atom,
    utf8_string: Atom,
}

impl X11Backend {
    /// Create a new X11 backend
    pub fn new() -> anyhow::Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let root = conn.setup().roots[screen_num].root;

        let atoms = Self::intern_atoms(&conn)?;

        let mut backend = Self {
            conn,
            root,
            atoms,
            capabilities: Capabilities {
                window_activation: false,
                window_bounds: true,
                pointer_query: true,
            },
        };
        backend.capabilities.window_activation = backend.wm_supports(backend.atoms.net_active_window);

        if !backend.capabilities.window_activation {
            tracing::warn!("Window manager does not advertise _NET_ACTIVE_WINDOW; activation disabled");
        }

        Ok(backend)
    }

    fn intern_atoms(conn: &RustConnection) -> anyhow::Result<X11Atoms> {
        let intern = |name: &[u8]| -> anyhow::Result<Atom> {
            Ok(conn.intern_atom(false, name)?.reply()?.atom)
        };

        Ok(X11Atoms {
            net_supported: intern(b"_NET_SUPPORTED")?,
            net_client_list: intern(b"_NET_CLIENT_LIST")?,
            net_wm_name: intern(b"_NET_WM_NAME")?,
            net_active_window: intern(b"_NET_ACTIVE_WINDOW")?,
            wm_class: intern(b"WM_CLASS")?,
            wm_name: intern(b"WM_NAME")?,
            utf8_string: intern(b"UTF8_STRING")?,
        })
    }

    fn get_window_property(&self, window: Window, property: Atom, type_: Atom) -> anyhow::Result<Option<Vec<u8>>> {
        let reply = self.conn.get_property(
            false,
            window,
            property,
            type_,
            0,
            u32::MAX,
        )?.reply()?;

        if reply.value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply.value))
        }
    }

    /// Reads a property holding 32-bit values (window or atom lists)
    fn get_u32_list(&self, window: Window, property: Atom, type_: Atom) -> Vec<u32> {
        match self.get_window_property(window, property, type_) {
            Ok(Some(data)) => data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn wm_supports(&self, atom: Atom) -> bool {
        self.get_u32_list(self.root, self.atoms.net_supported, AtomEnum::ATOM.into())
            .contains(&atom)
    }

    fn get_window_title(&self, window: Window) -> String {
        // Try _NET_WM_NAME first (UTF-8)
        if let Ok(Some(data)) = self.get_window_property(window, self.atoms.net_wm_name, self.atoms.utf8_string) {
            if let Ok(s) = String::from_utf8(data) {
                return s;
            }
        }

        // Fall back to WM_NAME (Latin-1 in practice)
        if let Ok(Some(data)) = self.get_window_property(window, self.atoms.wm_name, AtomEnum::STRING.into()) {
            return String::from_utf8_lossy(&data).into_owned();
        }

        String::new()
    }

    fn get_window_class(&self, window: Window) -> String {
        if let Ok(Some(data)) = self.get_window_property(window, self.atoms.wm_class, AtomEnum::STRING.into()) {
            // WM_CLASS is two null-separated strings: instance name and class name
            let parts: Vec<&[u8]> = data.split(|&b| b == 0).filter(|p| !p.is_empty()).collect();
            if let Some(part) = parts.get(1).or(parts.first()) {
                return String::from_utf8_lossy(part).into_owned();
            }
        }
        String::new()
    }

    fn get_window_geometry(&self, window: Window) -> anyhow::Result<Geometry> {
        let geom = self.conn.get_geometry(window)?.reply()?;

        // Translate to root window coordinates
        let translated = self.conn.translate_coordinates(window, self.root, 0, 0)?.reply()?;

        Ok(Geometry {
            x: translated.dst_x as i32,
            y: translated.dst_y as i32,
            width: geom.width as u32,
            height: geom.height as u32,
        })
    }

    fn get_active_window(&self) -> Option<Window> {
        self.get_u32_list(self.root, self.atoms.net_active_window, AtomEnum::WINDOW.into())
            .first()
            .copied()
            .filter(|&w| w != 0)
    }
}

#[async_trait]
impl WindowBackend for X11Backend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn list_windows(&self) -> anyhow::Result<Vec<WindowHandle>> {
        let active_window = self.get_active_window();

        let mut windows: Vec<WindowHandle> = self
            .get_u32_list(self.root, self.atoms.net_client_list, AtomEnum::WINDOW.into())
            .into_iter()
            .map(|window_id| {
                let bounds = match self.get_window_geometry(window_id) {
                    Ok(geometry) if !geometry.is_empty() => Some(geometry),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!("No geometry for window {:#x}: {}", window_id, e);
                        None
                    }
                };

                WindowHandle {
                    id: PlatformWindowId::X11(window_id),
                    title: self.get_window_title(window_id),
                    class: self.get_window_class(window_id),
                    bounds,
                    active: active_window == Some(window_id),
                }
            })
            .collect();

        normalize_active(&mut windows);
        Ok(windows)
    }

    async fn focus_window(&self, id: &PlatformWindowId) -> anyhow::Result<()> {
        let PlatformWindowId::X11(window_id) = id else {
            anyhow::bail!("X11 backend cannot handle non-X11 window IDs");
        };

        // Use _NET_ACTIVE_WINDOW client message
        let event = xproto::ClientMessageEvent::new(
            32,
            *window_id,
            self.atoms.net_active_window,
            [1, x11rb::CURRENT_TIME, 0, 0, 0], // Source indication: 1 = application
        );

        self.conn.send_event(
            false,
            self.root,
            xproto::EventMask::SUBSTRUCTURE_REDIRECT | xproto::EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )?;

        self.conn.flush()?;
        Ok(())
    }

    async fn screen_size(&self) -> anyhow::Result<ScreenSize> {
        // Query the root rather than the setup block so RandR changes show up
        let geom = self.conn.get_geometry(self.root)?.reply()?;
        Ok(ScreenSize {
            width: geom.width as u32,
            height: geom.height as u32,
        })
    }

    async fn pointer_position(&self) -> anyhow::Result<Point> {
        let pointer = self.conn.query_pointer(self.root)?.reply()?;
        Ok(Point {
            x: pointer.root_x as i32,
            y: pointer.root_y as i32,
        })
    }
}
