use std::path::Path;

use pet_vision::config::SplitPaths;
use pet_vision::dataset::{normalize_bbox, CocoToYolo, DatasetYaml};

const COCO: &str = r#"{
  "images": [
    { "id": 1, "file_name": "000001.jpg", "width": 640, "height": 480 },
    { "id": 2, "file_name": "000002.jpg", "width": 200, "height": 100 },
    { "id": 3, "file_name": "000003.jpg", "width": 640, "height": 480 }
  ],
  "annotations": [
    { "image_id": 1, "category_id": 17, "bbox": [0, 0, 640, 480] },
    { "image_id": 1, "category_id": 1, "bbox": [11, 20, 30, 40] },
    { "image_id": 2, "category_id": 18, "bbox": [50, 25, 100, 50] },
    { "image_id": 3, "category_id": 3, "bbox": [0, 0, 10, 10] }
  ],
  "categories": [
    { "id": 1, "name": "person" },
    { "id": 3, "name": "car" },
    { "id": 17, "name": "cat" },
    { "id": 18, "name": "dog" }
  ]
}"#;

fn split(root: &Path) -> SplitPaths {
    SplitPaths {
        name: "train",
        annotations: root.join("coco/annotations/instances_train2017.json"),
        images: root.join("coco/train/data"),
        out_images: root.join("out/train/images"),
        out_labels: root.join("out/train/labels"),
    }
}

fn converter() -> CocoToYolo {
    CocoToYolo::new(vec!["cat".into(), "dog".into(), "person".into()]).unwrap()
}

#[test]
fn whole_image_box_is_exactly_centered() {
    assert_eq!(
        normalize_bbox([0.0, 0.0, 1920.0, 1080.0], 1920.0, 1080.0),
        (0.5, 0.5, 1.0, 1.0)
    );
}

#[test]
fn converts_target_classes_only() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let split = split(dir.path());
    std::fs::create_dir_all(split.annotations.parent().unwrap())?;
    std::fs::write(&split.annotations, COCO)?;
    std::fs::create_dir_all(&split.images)?;
    std::fs::write(split.images.join("000001.jpg"), b"jpeg bytes")?;

    let stats = converter().convert(&split)?;
    assert_eq!(stats.images, 2);
    assert_eq!(stats.labels, 2);
    assert_eq!(stats.annotations, 3);
    assert_eq!(stats.missing_images, 1);
    assert_eq!(stats.failures, 0);

    let first = std::fs::read_to_string(split.out_labels.join("000001.txt"))?;
    assert_eq!(
        first,
        "0 0.500000 0.500000 1.000000 1.000000\n2 0.040625 0.083333 0.046875 0.083333\n"
    );
    let second = std::fs::read_to_string(split.out_labels.join("000002.txt"))?;
    assert_eq!(second, "1 0.500000 0.500000 0.500000 0.500000\n");

    assert!(split.out_images.join("000001.jpg").is_file());
    assert!(!split.out_labels.join("000003.txt").exists());
    Ok(())
}

#[test]
fn converting_twice_overwrites_labels() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let split = split(dir.path());
    std::fs::create_dir_all(split.annotations.parent().unwrap())?;
    std::fs::write(&split.annotations, COCO)?;

    converter().convert(&split)?;
    let once = std::fs::read_to_string(split.out_labels.join("000001.txt"))?;
    converter().convert(&split)?;
    let twice = std::fs::read_to_string(split.out_labels.join("000001.txt"))?;
    assert_eq!(once, twice);
    assert_eq!(twice.lines().count(), 2);
    Ok(())
}

#[test]
fn missing_or_empty_annotations_fail() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let split = split(dir.path());
    assert!(converter().convert(&split).is_err());

    std::fs::create_dir_all(split.annotations.parent().unwrap())?;
    std::fs::write(&split.annotations, "  \n")?;
    assert!(converter().convert(&split).is_err());
    Ok(())
}

#[test]
fn dataset_yaml_lists_indexed_names() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let yaml_path = dir.path().join("yaml/pet.yaml");
    let root = dir.path().join("out");
    converter().write_dataset_yaml(
        &yaml_path,
        &root,
        &root.join("train/images"),
        &root.join("val/images"),
    )?;

    let parsed: DatasetYaml = serde_yaml::from_str(&std::fs::read_to_string(&yaml_path)?)?;
    assert_eq!(parsed.path, root);
    assert_eq!(parsed.train, root.join("train/images"));
    assert_eq!(parsed.val, root.join("val/images"));
    assert_eq!(
        parsed.names.values().cloned().collect::<Vec<_>>(),
        vec!["cat", "dog", "person"]
    );
    Ok(())
}

#[test]
fn dotted_file_names_keep_their_own_label() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let split = split(dir.path());
    std::fs::create_dir_all(split.annotations.parent().unwrap())?;
    std::fs::write(
        &split.annotations,
        r#"{
  "images": [
    { "id": 1, "file_name": "cat.v1.jpg", "width": 100, "height": 100 },
    { "id": 2, "file_name": "cat.v2.jpg", "width": 100, "height": 100 }
  ],
  "annotations": [
    { "image_id": 1, "category_id": 17, "bbox": [0, 0, 100, 100] },
    { "image_id": 2, "category_id": 17, "bbox": [25, 25, 50, 50] }
  ],
  "categories": [{ "id": 17, "name": "cat" }]
}"#,
    )?;

    let stats = converter().convert(&split)?;
    assert_eq!(stats.labels, 2);
    assert_eq!(
        std::fs::read_to_string(split.out_labels.join("cat.v1.txt"))?,
        "0 0.500000 0.500000 1.000000 1.000000\n"
    );
    assert_eq!(
        std::fs::read_to_string(split.out_labels.join("cat.v2.txt"))?,
        "0 0.500000 0.500000 0.500000 0.500000\n"
    );
    assert!(!split.out_labels.join("cat.txt").exists());
    Ok(())
}
