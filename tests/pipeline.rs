//! End-to-end conversions through the public API.
//!
//! Each test drives a [`ConversionOrchestrator`] from drop to delivery and
//! checks what reached the download sink.

use imageflip::codec::PassthroughCodec;
use imageflip::download::{
    DirectorySink, DownloadDispatcher, DownloadError, DownloadOptions, DownloadSink,
};
use imageflip::intake::IntakeError;
use imageflip::orchestrator::{ConversionOrchestrator, Status};
use imageflip::runner::{ChunkedRunner, ThreadedRunner, TaskRunner};
use imageflip::types::{ConversionResult, Direction, PendingFile};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

type Saves = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;

#[derive(Clone, Default)]
struct CollectingSink {
    saves: Saves,
}

impl DownloadSink for CollectingSink {
    fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        self.saves.lock().unwrap().push((
            file_name.to_string(),
            mime_type.to_string(),
            bytes.to_vec(),
        ));
        Ok(())
    }
}

fn orchestrator(runner: Box<dyn TaskRunner>, direction: Direction) -> (ConversionOrchestrator, Saves) {
    let sink = CollectingSink::default();
    let saves = sink.saves.clone();
    let dispatcher = DownloadDispatcher::new(Box::new(sink), DownloadOptions::default());
    let orch = ConversionOrchestrator::new(runner, Arc::new(PassthroughCodec), dispatcher, direction);
    (orch, saves)
}

fn file(name: &str) -> PendingFile {
    PendingFile::from_bytes(name, format!("bytes of {name}").into_bytes())
}

fn entry_names(zip_bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn entry_contents(zip_bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    entry.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn single_avif_becomes_jpg() {
    let (mut orch, saves) = orchestrator(Box::new(ThreadedRunner), Direction::AvifToJpg);
    orch.submit_files(vec![file("a.avif")]).unwrap();
    assert!(orch.start_conversion());
    assert_eq!(orch.wait(), Status::Success);
    assert_eq!(orch.percent(), 100);

    let saves = saves.lock().unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].0, "a.jpg");
    assert_eq!(saves[0].1, "image/jpeg");
    assert_eq!(saves[0].2, b"bytes of a.avif");
}

#[test]
fn three_files_become_one_archive() {
    let (mut orch, saves) = orchestrator(Box::new(ThreadedRunner), Direction::AvifToJpg);
    orch.submit_files(vec![file("a.avif"), file("b.avif"), file("c.png")])
        .unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Success);

    let saves = saves.lock().unwrap();
    assert_eq!(saves.len(), 1);
    let (name, mime, bytes) = &saves[0];
    assert_eq!(name, "converted_images.zip");
    assert_eq!(mime, "application/zip");
    assert_eq!(entry_names(bytes), vec!["a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(entry_contents(bytes, "c.jpg"), b"bytes of c.png");
}

#[test]
fn jpg_to_avif_uses_avif_mime() {
    let (mut orch, saves) = orchestrator(Box::new(ChunkedRunner), Direction::JpgToAvif);
    orch.submit_files(vec![file("x.jpg")]).unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Success);

    let saves = saves.lock().unwrap();
    assert_eq!(saves[0].0, "x.avif");
    assert_eq!(saves[0].1, "image/avif");
}

#[test]
fn unrecognized_drop_keeps_status() {
    let (mut orch, saves) = orchestrator(Box::new(ThreadedRunner), Direction::AvifToJpg);
    let err = orch
        .submit_files(vec![file("notes.txt"), file("clip.gif")])
        .unwrap_err();
    assert_eq!(err, IntakeError::InvalidInput { rejected: 2 });
    assert_eq!(orch.status(), Status::Idle);
    assert!(orch.files().is_empty());

    orch.submit_files(vec![file("a.avif")]).unwrap();
    assert!(orch.submit_files(Vec::new()).is_err());
    assert_eq!(orch.status(), Status::Ready);
    assert_eq!(orch.files().len(), 1);
    assert!(saves.lock().unwrap().is_empty());
}

#[test]
fn unreadable_file_fails_whole_batch() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths: Vec<_> = ["a.avif", "b.avif", "c.avif"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect();
    let files: Vec<_> = paths
        .iter()
        .map(|p| PendingFile::from_path(p).unwrap())
        .collect();
    std::fs::remove_file(&paths[1]).unwrap();

    let (mut orch, saves) = orchestrator(Box::new(ThreadedRunner), Direction::AvifToJpg);
    orch.submit_files(files).unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Error);

    assert!(orch.error().unwrap().contains("b.avif"));
    assert!(matches!(
        orch.result(),
        Some(ConversionResult::Failure { .. })
    ));
    assert!(orch.percent() < 100);
    assert!(saves.lock().unwrap().is_empty());
}

#[test]
fn directory_sink_receives_archive() {
    let out = tempfile::TempDir::new().unwrap();
    let sink = DirectorySink::new(out.path()).unwrap();
    let dispatcher = DownloadDispatcher::new(Box::new(sink), DownloadOptions::default());
    let mut orch = ConversionOrchestrator::new(
        Box::new(ThreadedRunner),
        Arc::new(PassthroughCodec),
        dispatcher,
        Direction::JpgToAvif,
    );

    orch.submit_files(vec![file("one.jpg"), file("two.jpeg")])
        .unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Success);
    assert!(orch.warning().is_none());

    let bytes = std::fs::read(out.path().join("converted_images.zip")).unwrap();
    assert_eq!(entry_names(&bytes), vec!["one.avif", "two.avif"]);
}

#[test]
fn convert_more_after_success() {
    let (mut orch, saves) = orchestrator(Box::new(ChunkedRunner), Direction::AvifToJpg);
    orch.submit_files(vec![file("a.avif")]).unwrap();
    orch.start_conversion();
    orch.wait();

    orch.reset_to_idle();
    assert_eq!(orch.status(), Status::Idle);
    assert!(orch.result().is_none());

    orch.set_direction(Direction::JpgToAvif);
    orch.submit_files(vec![file("b.jpg")]).unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Success);

    let names: Vec<_> = saves.lock().unwrap().iter().map(|s| s.0.clone()).collect();
    assert_eq!(names, vec!["a.jpg", "b.avif"]);
}

#[test]
fn names_with_directories_save_as_plain_files() {
    let out = tempfile::TempDir::new().unwrap();
    let sink = DirectorySink::new(out.path()).unwrap();
    let dispatcher = DownloadDispatcher::new(Box::new(sink), DownloadOptions::default());
    let mut orch = ConversionOrchestrator::new(
        Box::new(ChunkedRunner),
        Arc::new(PassthroughCodec),
        dispatcher,
        Direction::AvifToJpg,
    );

    orch.submit_files(vec![file("../escape.avif")]).unwrap();
    orch.start_conversion();
    assert_eq!(orch.wait(), Status::Success);
    assert!(orch.warning().is_none());
    assert!(out.path().join("escape.jpg").exists());
}
