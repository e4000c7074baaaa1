//! Container layouts: where the index and payloads live inside an archive.

use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    traits::ArchiveReader,
};

pub const MODULE_JSON: &str = "module.json";
pub const CONFIG_JSON: &str = "config.json";
pub const INDEX_FILE: &str = "resources.index";

#[derive(Deserialize)]
struct ModuleJson {
    module: ModuleV2,
}

#[derive(Deserialize)]
struct ModuleV2 {
    name: String,
}

#[derive(Deserialize)]
struct ConfigJson {
    module: ModuleV1,
}

#[derive(Deserialize)]
struct ModuleV1 {
    distro: Distro,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Distro {
    module_name: String,
}

/// The two manifest generations an archive can be packaged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLayout {
    /// `config.json` manifest; resources under `assets/<module>/`.
    V1 { module: String },
    /// `module.json` manifest; resources at the archive root.
    V2 { module: String },
}

impl ManifestLayout {
    /// Detects the layout by probing for `module.json`, then `config.json`.
    pub fn probe(reader: &dyn ArchiveReader, archive: &Path) -> Result<Self> {
        let layout = if reader.contains(archive, MODULE_JSON) {
            let manifest: ModuleJson =
                serde_json::from_str(&reader.read_to_string(archive, MODULE_JSON)?)?;
            ManifestLayout::V2 {
                module: manifest.module.name,
            }
        } else if reader.contains(archive, CONFIG_JSON) {
            let manifest: ConfigJson =
                serde_json::from_str(&reader.read_to_string(archive, CONFIG_JSON)?)?;
            ManifestLayout::V1 {
                module: manifest.module.distro.module_name,
            }
        } else {
            return Err(Error::Manifest(format!(
                "{} has neither {} nor {}",
                archive.display(),
                MODULE_JSON,
                CONFIG_JSON
            )));
        };

        if layout.module().is_empty() {
            return Err(Error::Manifest(format!(
                "{} declares an empty module name",
                archive.display()
            )));
        }
        debug!("{} uses layout {:?}", archive.display(), layout);
        Ok(layout)
    }

    pub fn module(&self) -> &str {
        match self {
            ManifestLayout::V1 { module } | ManifestLayout::V2 { module } => module,
        }
    }

    /// Member name of the binary index.
    pub fn index_member(&self) -> String {
        match self {
            ManifestLayout::V1 { module } => format!("assets/{}/{}", module, INDEX_FILE),
            ManifestLayout::V2 { .. } => INDEX_FILE.to_string(),
        }
    }

    /// Member prefix of the resource tree, ending in `/`.
    pub fn resource_root(&self) -> String {
        match self {
            ManifestLayout::V1 { module } => format!("assets/{}/resources/", module),
            ManifestLayout::V2 { .. } => "resources/".to_string(),
        }
    }

    /// Maps a media or profile record value (`<module>/resources/...`) to a member name.
    ///
    /// Values that are not prefixed with the module name are taken relative to
    /// the resource root.
    pub fn payload_member(&self, value: &str) -> String {
        let prefix = format!("{}/", self.module());
        match (self, value.strip_prefix(&prefix)) {
            (ManifestLayout::V1 { .. }, Some(_)) => format!("assets/{}", value),
            (ManifestLayout::V2 { .. }, Some(rest)) => rest.to_string(),
            (_, None) => format!("{}{}", self.resource_root(), value.trim_start_matches('/')),
        }
    }

    pub fn rawfile_member(&self, name: &str) -> String {
        format!("{}rawfile/{}", self.resource_root(), name.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RawFileDescriptor;
    use std::collections::HashMap;

    struct Members(HashMap<&'static str, &'static str>);

    impl ArchiveReader for Members {
        fn contains(&self, _: &Path, member: &str) -> bool {
            self.0.contains_key(member)
        }

        fn read(&self, _: &Path, member: &str) -> Result<Vec<u8>> {
            self.0
                .get(member)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| Error::NotFound(member.to_string()))
        }

        fn open_raw(&self, _: &Path, member: &str) -> Result<RawFileDescriptor> {
            Err(Error::NotFound(member.to_string()))
        }
    }

    #[test]
    fn test_probe_prefers_module_json() {
        let reader = Members(HashMap::from([
            (MODULE_JSON, r#"{"module":{"name":"entry","type":"entry"}}"#),
            (CONFIG_JSON, r#"{"module":{"distro":{"moduleName":"legacy"}}}"#),
        ]));
        let layout = ManifestLayout::probe(&reader, Path::new("a.hap")).unwrap();
        assert_eq!(layout, ManifestLayout::V2 { module: "entry".into() });
        assert_eq!(layout.index_member(), "resources.index");
    }

    #[test]
    fn test_probe_v1() {
        let reader = Members(HashMap::from([(
            CONFIG_JSON,
            r#"{"app":{},"module":{"distro":{"moduleName":"entry"}}}"#,
        )]));
        let layout = ManifestLayout::probe(&reader, Path::new("a.hap")).unwrap();
        assert_eq!(layout.index_member(), "assets/entry/resources.index");
        assert_eq!(layout.rawfile_member("a/b.txt"), "assets/entry/resources/rawfile/a/b.txt");
    }

    #[test]
    fn test_probe_failures() {
        let empty = Members(HashMap::new());
        assert!(matches!(
            ManifestLayout::probe(&empty, Path::new("a.hap")),
            Err(Error::Manifest(_))
        ));

        let broken = Members(HashMap::from([(MODULE_JSON, "{")]));
        assert!(matches!(
            ManifestLayout::probe(&broken, Path::new("a.hap")),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_payload_member() {
        let v2 = ManifestLayout::V2 { module: "entry".into() };
        assert_eq!(
            v2.payload_member("entry/resources/base/media/icon.png"),
            "resources/base/media/icon.png"
        );
        assert_eq!(v2.payload_member("base/media/icon.png"), "resources/base/media/icon.png");

        let v1 = ManifestLayout::V1 { module: "entry".into() };
        assert_eq!(
            v1.payload_member("entry/resources/base/media/icon.png"),
            "assets/entry/resources/base/media/icon.png"
        );
    }
}
