use anyhow::Result;
use std::fs;
use std::path::Path;

use smart_scale::detect::{BoundingBox, Detection, StubBackend};
use smart_scale::eval::chart::save_chart;
use smart_scale::eval::{
    collect_samples, linspace, read_results, run_batch, sweep, ResultWriter,
};

fn write_image(path: &Path) -> Result<()> {
    image::RgbImage::from_pixel(16, 16, image::Rgb([90, 160, 40])).save(path)?;
    Ok(())
}

fn detection(label: &str, confidence: f32) -> Vec<Detection> {
    vec![Detection::new(label, confidence, BoundingBox::default())]
}

#[test]
fn classify_then_sweep() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("dataset");
    for label in ["apple", "banana"] {
        fs::create_dir_all(root.join(label))?;
    }
    write_image(&root.join("apple/1.png"))?;
    write_image(&root.join("apple/2.JPG"))?;
    write_image(&root.join("banana/1.jpeg"))?;
    write_image(&root.join("banana/2.png"))?;
    fs::write(root.join("banana/readme.md"), "not a sample")?;

    let samples = collect_samples(&root)?;
    assert_eq!(samples.len(), 4);

    // One scripted result per sample, in enumeration order.
    let mut detector = StubBackend::scripted(vec![
        detection("apple", 0.92),
        detection("banana", 0.50),
        detection("banana", 0.81),
        Vec::new(),
    ]);
    let table_path = dir.path().join("results.csv");
    let mut table = ResultWriter::create(&table_path)?;
    let summary = run_batch(&mut detector, &samples, 0.25, &mut table, |_| {})?;
    table.finish()?;
    assert_eq!((summary.evaluated, summary.skipped), (4, 0));

    let rows = read_results(&table_path)?;
    assert_eq!(rows[3].predicted_label, "none");
    assert_eq!(rows[3].confidence, 0.0);

    let points = sweep(&rows, &linspace(0.0, 0.9, 4))?;
    // 0.0 accepts every row, including the no-detection one.
    assert_eq!(points[0].coverage, 1.0);
    // 0.3: apple->apple, apple->banana, banana->banana.
    assert_eq!(points[1].accepted, 3);
    assert!((points[1].f1 - 2.0 / 3.0).abs() < 1e-9);
    // 0.6: two correct predictions only.
    assert_eq!(points[2].accepted, 2);
    assert_eq!(points[2].f1, 1.0);
    // 0.9: only the 0.92 apple.
    assert_eq!(points[3].accepted, 1);
    assert_eq!(points[3].coverage, 0.25);

    let chart_path = dir.path().join("curve.png");
    save_chart(&points, &chart_path, None)?;
    assert!(chart_path.is_file());
    Ok(())
}

#[test]
fn reruns_overwrite_the_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("dataset");
    fs::create_dir_all(root.join("orange"))?;
    write_image(&root.join("orange/a.png"))?;
    let samples = collect_samples(&root)?;
    let table_path = dir.path().join("results.csv");

    for _ in 0..2 {
        let mut table = ResultWriter::create(&table_path)?;
        let mut detector = StubBackend::fixed("orange", 0.7);
        run_batch(&mut detector, &samples, 0.25, &mut table, |_| {})?;
        table.finish()?;
    }
    assert_eq!(read_results(&table_path)?.len(), 1);
    Ok(())
}
