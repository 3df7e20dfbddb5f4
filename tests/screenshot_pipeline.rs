//! Screenshot pipeline against the in-memory desktop

use std::sync::Arc;
use std::time::Duration;

use computer_use_mcp::backend::Capabilities;
use computer_use_mcp::backend::mock::{MockDesktop, MockRecognizer, mock_window};
use computer_use_mcp::core::errors::DesktopError;
use computer_use_mcp::core::window::{Geometry, PlatformWindowId};
use computer_use_mcp::ocr::TextFragment;
use computer_use_mcp::screenshot::compress::CompressionPolicy;
use computer_use_mcp::screenshot::{ScreenshotRequest, ScreenshotService};

fn service(
    mock: &Arc<MockDesktop>,
    recognizer: &Arc<MockRecognizer>,
    dir: &std::path::Path,
) -> ScreenshotService {
    ScreenshotService::new(
        mock.clone(),
        mock.clone(),
        recognizer.clone(),
        CompressionPolicy::default(),
        dir.to_path_buf(),
    )
    .with_settle_delays(Duration::ZERO, Duration::ZERO)
}

fn fragment(text: &str, bounds: Geometry) -> TextFragment {
    TextFragment {
        text: text.to_string(),
        bounds,
        confidence: 0.9,
    }
}

#[tokio::test]
async fn full_screen_capture_covers_the_screen() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());

    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&ScreenshotRequest::default())
        .await
        .unwrap();

    assert_eq!(shot.region, Geometry::new(0, 0, 1280, 720));
    assert!(shot.window.is_none());
    assert!(shot.fragments.is_none());
    assert!(shot.saved_path.is_none());
    assert!(shot.image.png.len() <= CompressionPolicy::default().max_bytes);
    assert!(recognizer.calls().is_empty());
}

#[tokio::test]
async fn window_capture_activates_and_restores_focus() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        title_pattern: Some("Notepad".to_string()),
        ..Default::default()
    };
    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap();

    assert_eq!(shot.region, Geometry::new(100, 200, 400, 300));
    assert_eq!((shot.image.width, shot.image.height), (400, 300));
    assert_eq!(shot.window.unwrap().window.title, "Untitled - Notepad");
    assert!(shot.limitations.is_empty());

    // Notepad raised for the capture, then Terminal given focus back
    assert_eq!(
        mock.events().focused,
        vec![PlatformWindowId::X11(2), PlatformWindowId::X11(1)]
    );
}

#[tokio::test]
async fn unmatched_title_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        title_pattern: Some("Spreadsheet".to_string()),
        ..Default::default()
    };
    let err = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, DesktopError::NotFound { .. }));
    assert_eq!(mock.events().captures, 0);
}

#[tokio::test]
async fn malformed_regex_is_invalid_argument() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        title_pattern: Some("Note(pad".to_string()),
        use_regex: true,
        ..Default::default()
    };
    let err = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
}

#[tokio::test]
async fn ocr_boxes_are_in_screen_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::new(vec![fragment(
        "File",
        Geometry::new(10, 5, 50, 12),
    )]));

    let request = ScreenshotRequest {
        title_pattern: Some("Notepad".to_string()),
        with_ocr: true,
        ..Default::default()
    };
    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap();

    let fragments = shot.fragments.unwrap();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].text, "File");
    assert_eq!(fragments[0].bounds, Geometry::new(110, 205, 50, 12));
    // OCR sees the uncompressed window pixels
    assert_eq!(recognizer.calls(), vec![(400, 300)]);
}

#[tokio::test]
async fn ocr_scale_maps_boxes_back_to_full_size() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::new(vec![fragment(
        "Edit",
        Geometry::new(10, 5, 50, 12),
    )]));

    let request = ScreenshotRequest {
        title_pattern: Some("Notepad".to_string()),
        with_ocr: true,
        ocr_scale_percent: 50,
        ..Default::default()
    };
    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap();

    assert_eq!(recognizer.calls(), vec![(200, 150)]);
    assert_eq!(
        shot.fragments.unwrap()[0].bounds,
        Geometry::new(120, 210, 100, 24)
    );
}

#[tokio::test]
async fn ocr_scale_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        with_ocr: true,
        ocr_scale_percent: 0,
        ..Default::default()
    };
    let err = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
    assert_eq!(mock.events().captures, 0);
}

#[tokio::test]
async fn saved_screenshots_get_distinct_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new());
    let recognizer = Arc::new(MockRecognizer::default());
    let service = service(&mock, &recognizer, dir.path());

    let request = ScreenshotRequest {
        save_to_downloads: true,
        ..Default::default()
    };
    let first = service.take_screenshot(&request).await.unwrap();
    let second = service.take_screenshot(&request).await.unwrap();

    let a = first.saved_path.unwrap();
    let b = second.saved_path.unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with(dir.path()));
    assert_eq!(std::fs::read(&a).unwrap(), first.image.png);
}

#[tokio::test]
async fn missing_bounds_fall_back_to_full_screen() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::with_windows(vec![mock_window(
        7,
        "Untitled - Notepad",
        None,
        true,
    )]));
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        title_pattern: Some("Notepad".to_string()),
        ..Default::default()
    };
    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap();

    assert_eq!(shot.region, Geometry::new(0, 0, 1280, 720));
    assert!(shot.limitations.iter().any(|l| l.capability == "window_bounds"));
    // Already active: nothing to raise or restore
    assert!(mock.events().focused.is_empty());
}

#[tokio::test]
async fn no_activation_support_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDesktop::new().with_capabilities(Capabilities {
        window_activation: false,
        window_bounds: true,
        pointer_query: true,
    }));
    let recognizer = Arc::new(MockRecognizer::default());

    let request = ScreenshotRequest {
        title_pattern: Some("Notepad".to_string()),
        ..Default::default()
    };
    let shot = service(&mock, &recognizer, dir.path())
        .take_screenshot(&request)
        .await
        .unwrap();

    assert_eq!(shot.region, Geometry::new(100, 200, 400, 300));
    assert!(shot.limitations.iter().any(|l| l.capability == "window_activation"));
    assert!(mock.events().focused.is_empty());
}
