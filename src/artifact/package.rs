// ABOUTME: Wraps web, EJB and connector archives into an enterprise archive.
// ABOUTME: Generates the application descriptor and writes the EAR with the zip crate.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::descriptor::{Artifact, ArtifactType};

pub const APPLICATION_XML: &str = "META-INF/application.xml";
pub const DEFAULT_EAR_LEVEL: &str = "5";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{path} is already an enterprise archive")]
    AlreadyEar { path: PathBuf },

    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Turns a non-EAR artifact into an EAR artifact.
pub trait ArchivePackager: Send + Sync {
    fn wrap(&self, artifact: &Artifact) -> Result<Artifact, PackageError>;
}

/// Writes `<app>.ear` next to the source archive, or into `output_dir` if set.
#[derive(Debug, Clone)]
pub struct EarPackager {
    ear_level: String,
    output_dir: Option<PathBuf>,
}

impl Default for EarPackager {
    fn default() -> Self {
        Self::new(DEFAULT_EAR_LEVEL)
    }
}

impl EarPackager {
    pub fn new(ear_level: impl Into<String>) -> Self {
        Self {
            ear_level: ear_level.into(),
            output_dir: None,
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    fn destination(&self, artifact: &Artifact) -> PathBuf {
        let dir = self
            .output_dir
            .clone()
            .or_else(|| artifact.source_path().parent().map(Path::to_path_buf))
            .unwrap_or_default();
        dir.join(format!("{}.ear", artifact.app_name()))
    }
}

impl ArchivePackager for EarPackager {
    fn wrap(&self, artifact: &Artifact) -> Result<Artifact, PackageError> {
        let source = artifact.source_path();
        if artifact.kind() == ArtifactType::Ear {
            return Err(PackageError::AlreadyEar {
                path: source.to_path_buf(),
            });
        }

        let module_file = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PackageError::NoFileName(source.to_path_buf()))?;

        let context_root = artifact
            .context_root()
            .map(str::to_string)
            .unwrap_or_else(|| format!("/{}", artifact.app_name()));

        let descriptor = application_xml(
            artifact.app_name().as_str(),
            artifact.kind(),
            module_file,
            &context_root,
            &self.ear_level,
        );

        let destination = self.destination(artifact);
        write_ear(&destination, source, module_file, &descriptor)?;

        tracing::debug!(
            source = %source.display(),
            ear = %destination.display(),
            "wrapped archive into enterprise archive"
        );

        Ok(artifact.with_source(destination))
    }
}

fn write_ear(
    destination: &Path,
    source: &Path,
    module_file: &str,
    descriptor: &str,
) -> Result<(), PackageError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| PackageError::Io { path, source }
    };
    let zip_err = |source: zip::result::ZipError| PackageError::Zip {
        path: destination.to_path_buf(),
        source,
    };

    let mut input = File::open(source).map_err(io_err(source))?;
    let output = File::create(destination).map_err(io_err(destination))?;

    // Inner archives are already compressed.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut zip = ZipWriter::new(output);
    zip.start_file(APPLICATION_XML, options).map_err(zip_err)?;
    zip.write_all(descriptor.as_bytes())
        .map_err(io_err(destination))?;
    zip.start_file(module_file, options).map_err(zip_err)?;
    io::copy(&mut input, &mut zip).map_err(io_err(destination))?;
    zip.finish().map_err(zip_err)?;

    Ok(())
}

fn namespace(ear_level: &str) -> &'static str {
    let major = ear_level
        .split('.')
        .next()
        .and_then(|m| m.parse::<u32>().ok())
        .unwrap_or(5);
    match major {
        1 => "http://java.sun.com/xml/ns/j2ee",
        2..=8 => "http://java.sun.com/xml/ns/javaee",
        _ => "https://jakarta.ee/xml/ns/jakartaee",
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// The `META-INF/application.xml` for a single-module EAR.
pub fn application_xml(
    display_name: &str,
    kind: ArtifactType,
    module_file: &str,
    context_root: &str,
    ear_level: &str,
) -> String {
    let module_file = escape_xml(module_file);
    let module = match kind {
        ArtifactType::War => format!(
            "    <web>\n      <web-uri>{}</web-uri>\n      <context-root>{}</context-root>\n    </web>",
            module_file,
            escape_xml(context_root)
        ),
        ArtifactType::Jar => format!("    <ejb>{module_file}</ejb>"),
        ArtifactType::Rar => format!("    <connector>{module_file}</connector>"),
        ArtifactType::Ear | ArtifactType::Unknown => format!("    <java>{module_file}</java>"),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<application xmlns="{ns}" version="{level}">
  <display-name>{name}</display-name>
  <module>
{module}
  </module>
</application>
"#,
        ns = namespace(ear_level),
        level = escape_xml(ear_level),
        name = escape_xml(display_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppName, DeployTarget};
    use std::io::Read;

    fn artifact(path: &Path) -> Artifact {
        Artifact::builder(path)
            .app_name(AppName::new("shop").unwrap())
            .target(DeployTarget::parse("WebSphere:cell=c1,node=n1,server=s1").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn descriptor_names_web_module_and_context_root() {
        let xml = application_xml("shop", ArtifactType::War, "shop.war", "/shop", "5");
        assert!(xml.contains("<web-uri>shop.war</web-uri>"));
        assert!(xml.contains("<context-root>/shop</context-root>"));
        assert!(xml.contains(r#"version="5""#));
        assert!(xml.contains("http://java.sun.com/xml/ns/javaee"));
    }

    #[test]
    fn descriptor_uses_module_element_for_kind() {
        assert!(application_xml("a", ArtifactType::Jar, "a.jar", "/a", "5").contains("<ejb>a.jar</ejb>"));
        assert!(
            application_xml("a", ArtifactType::Rar, "a.rar", "/a", "5")
                .contains("<connector>a.rar</connector>")
        );
    }

    #[test]
    fn descriptor_namespace_follows_level() {
        assert!(application_xml("a", ArtifactType::War, "a.war", "/a", "1.4").contains("/j2ee"));
        assert!(application_xml("a", ArtifactType::War, "a.war", "/a", "10").contains("jakartaee"));
    }

    #[test]
    fn descriptor_escapes_markup() {
        let xml = application_xml("a&b", ArtifactType::War, "a.war", "/<x>", "5");
        assert!(xml.contains("a&amp;b"));
        assert!(xml.contains("/&lt;x&gt;"));
    }

    #[test]
    fn wrap_writes_ear_next_to_war() {
        let dir = tempfile::tempdir().unwrap();
        let war = dir.path().join("shop-1.0.war");
        std::fs::write(&war, b"war-bytes").unwrap();

        let wrapped = EarPackager::default().wrap(&artifact(&war)).unwrap();

        assert_eq!(wrapped.kind(), ArtifactType::Ear);
        assert_eq!(wrapped.source_path(), dir.path().join("shop.ear"));

        let mut archive = zip::ZipArchive::new(File::open(wrapped.source_path()).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name(APPLICATION_XML)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("<web-uri>shop-1.0.war</web-uri>"));
        assert!(xml.contains("<context-root>/shop</context-root>"));

        let mut module = Vec::new();
        archive
            .by_name("shop-1.0.war")
            .unwrap()
            .read_to_end(&mut module)
            .unwrap();
        assert_eq!(module, b"war-bytes");
    }

    #[test]
    fn wrap_refuses_ear_input() {
        let dir = tempfile::tempdir().unwrap();
        let ear = dir.path().join("shop.ear");
        std::fs::write(&ear, b"x").unwrap();
        let err = EarPackager::default().wrap(&artifact(&ear)).unwrap_err();
        assert!(matches!(err, PackageError::AlreadyEar { .. }));
    }

    #[test]
    fn wrap_reports_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.war");
        let err = EarPackager::default().wrap(&artifact(&missing)).unwrap_err();
        assert!(matches!(err, PackageError::Io { .. }));
    }
}
