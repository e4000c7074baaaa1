use indoc::indoc;
use resindex::index::IndexBuilder;
use resindex::types::{ResType, ResourceRecord};
use resindex::{Error, ManifestLayout, QualifierDescriptor, ResourceManager};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

const MODULE_JSON: &str = indoc! {r#"
    {
      "app": { "bundleName": "com.example.demo" },
      "module": {
        "name": "entry",
        "type": "entry",
        "deviceTypes": ["phone", "tablet"]
      }
    }
"#};

const CONFIG_JSON: &str = indoc! {r#"
    {
      "app": { "bundleName": "com.example.legacy" },
      "module": {
        "package": "com.example.legacy",
        "distro": {
          "moduleName": "entry",
          "moduleType": "entry"
        }
      }
    }
"#};

fn index_bytes() -> Vec<u8> {
    let mut builder = IndexBuilder::new("container 1.0");
    builder
        .add_folder(
            "default",
            vec![
                ResourceRecord::scalar(1, "app_name", ResType::String, "Demo"),
                ResourceRecord::scalar(
                    2,
                    "icon",
                    ResType::Media,
                    "entry/resources/base/media/icon.png",
                ),
            ],
        )
        .unwrap()
        .add_folder(
            "zh_CN",
            vec![ResourceRecord::scalar(1, "app_name", ResType::String, "演示")],
        )
        .unwrap();
    builder.build().unwrap()
}

/// Writes a zip container; `(member, bytes, stored)`.
fn write_zip(path: &Path, members: &[(&str, &[u8], bool)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, bytes, stored) in members {
        let method = if *stored {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer
            .start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn runtime(tag: &str) -> QualifierDescriptor {
    QualifierDescriptor::new().with_locale_tag(tag).unwrap()
}

#[test]
fn test_manifest_v2_zip() {
    let dir = TempDir::new().unwrap();
    let hap = dir.path().join("entry.hap");
    let index = index_bytes();
    write_zip(
        &hap,
        &[
            ("module.json", MODULE_JSON.as_bytes(), false),
            ("resources.index", &index, false),
            ("resources/base/media/icon.png", b"\x89PNG", false),
            ("resources/rawfile/config/settings.txt", b"volume=3", true),
        ],
    );

    let manager = ResourceManager::new(runtime("zh-Hans-CN"));
    manager.add_archive(&hap, &[]).unwrap();

    assert_eq!(manager.get_string_by_name("app_name").unwrap(), "演示");
    assert_eq!(
        manager.get_media_path(2, None).unwrap(),
        "resources/base/media/icon.png"
    );
    assert_eq!(manager.get_media_content(2, None).unwrap(), b"\x89PNG");
    assert_eq!(
        manager.get_raw_file_content("config/settings.txt").unwrap(),
        b"volume=3"
    );

    let mut raw = manager.open_raw_file("config/settings.txt").unwrap();
    let mut buf = vec![0u8; raw.length as usize];
    raw.handle.seek(SeekFrom::Start(raw.offset)).unwrap();
    raw.handle.read_exact(&mut buf).unwrap();
    assert_eq!(buf, b"volume=3");
}

#[test]
fn test_manifest_v1_zip() {
    let dir = TempDir::new().unwrap();
    let hap = dir.path().join("legacy.hap");
    let index = index_bytes();
    write_zip(
        &hap,
        &[
            ("config.json", CONFIG_JSON.as_bytes(), false),
            ("assets/entry/resources.index", &index, false),
            ("assets/entry/resources/base/media/icon.png", b"legacy", false),
            ("assets/entry/resources/rawfile/notes.txt", b"notes", false),
        ],
    );

    let manager = ResourceManager::new(runtime("en"));
    manager.add_archive(&hap, &[]).unwrap();

    assert_eq!(manager.get_string(1).unwrap(), "Demo");
    assert_eq!(
        manager.get_media_path_by_name("icon", None).unwrap(),
        "assets/entry/resources/base/media/icon.png"
    );
    assert_eq!(manager.get_media_content(2, None).unwrap(), b"legacy");
    assert_eq!(manager.get_raw_file_content("notes.txt").unwrap(), b"notes");
    // Deflated members cannot be handed out in place.
    assert!(matches!(
        manager.open_raw_file("notes.txt"),
        Err(Error::Manifest(_))
    ));
}

#[test]
fn test_unpacked_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("entry");
    fs::create_dir_all(root.join("resources/base/media")).unwrap();
    fs::write(root.join("module.json"), MODULE_JSON).unwrap();
    fs::write(root.join("resources.index"), index_bytes()).unwrap();
    fs::write(root.join("resources/base/media/icon.png"), b"dir").unwrap();

    let manager = ResourceManager::new(runtime("fr"));
    manager.add_archive(&root, &[]).unwrap();
    assert_eq!(manager.get_string(1).unwrap(), "Demo");
    assert_eq!(manager.get_media_content(2, None).unwrap(), b"dir");

    let archive = manager.archive_paths();
    assert_eq!(archive, vec![PathBuf::from(&root)]);
}

#[test]
fn test_layout_detection_errors() {
    let dir = TempDir::new().unwrap();
    let hap = dir.path().join("bare.hap");
    write_zip(&hap, &[("resources.index", &index_bytes(), false)]);
    let manager = ResourceManager::new(runtime("en"));
    assert!(matches!(
        manager.add_archive(&hap, &[]),
        Err(Error::Manifest(_))
    ));

    let broken = dir.path().join("broken.hap");
    fs::write(&broken, b"not a zip").unwrap();
    assert!(matches!(
        manager.add_archive(&broken, &[]),
        Err(Error::Manifest(_))
    ));

    let truncated = dir.path().join("truncated.hap");
    write_zip(
        &truncated,
        &[
            ("module.json", MODULE_JSON.as_bytes(), false),
            ("resources.index", &index_bytes()[..100], false),
        ],
    );
    assert!(matches!(
        manager.add_archive(&truncated, &[]),
        Err(Error::Decode(_))
    ));
    assert!(manager.archive_paths().is_empty());
}

#[test]
fn test_layout_probe_on_disk() {
    let dir = TempDir::new().unwrap();
    let hap = dir.path().join("legacy.hap");
    write_zip(&hap, &[("config.json", CONFIG_JSON.as_bytes(), false)]);
    let layout = ManifestLayout::probe(&resindex::FsArchiveReader, &hap).unwrap();
    assert_eq!(layout, ManifestLayout::V1 { module: "entry".into() });
    assert_eq!(layout.resource_root(), "assets/entry/resources/");
}
