use factory_devices::{FactoryController, SnapshotDisplay};
use factory_pipeline::{Actuator, ActuatorId, DisplaySink};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

#[test]
fn controller_session_is_bracketed_by_start_and_stop() {
    let tmp = TempDir::new().unwrap();
    let port = tmp.path().join("ttyACM0");
    std::fs::write(&port, "").unwrap();

    {
        let mut controller = FactoryController::open(&port);
        assert!(controller.is_connected());
        controller.push(ActuatorId::Lane1).unwrap();
        controller.push(ActuatorId::Lane2).unwrap();
    }

    let written = std::fs::read_to_string(&port).unwrap();
    assert_eq!(written, "START\nPUSH 1\nPUSH 2\nSTOP\n");
}

#[test]
fn detached_controller_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let port = tmp.path().join("missing").join("ttyACM0");
    let mut controller = FactoryController::open(&port);
    assert!(controller.push(ActuatorId::Lane2).is_err());
    drop(controller);
    assert!(!port.exists());
}

#[test]
fn snapshot_reshow_replaces_instead_of_accumulating() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("shots");
    let mut display = SnapshotDisplay::new(&dir).unwrap();

    display
        .show("Cam1 live", &RgbImage::from_pixel(4, 4, Rgb([10, 10, 10])))
        .unwrap();
    display
        .show("Cam1 live", &RgbImage::from_pixel(4, 4, Rgb([200, 0, 0])))
        .unwrap();
    display
        .show("Cam2 detected", &RgbImage::from_pixel(2, 2, Rgb([0, 0, 255])))
        .unwrap();

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cam1-live.png", "cam2-detected.png"]);
    assert_eq!(display.files().len(), 2);

    let latest = image::open(dir.join("cam1-live.png")).unwrap().to_rgb8();
    assert_eq!(latest.get_pixel(0, 0), &Rgb([200, 0, 0]));
}
