use std::{fs, io::Write, path::PathBuf};

use tempfile::{Builder, NamedTempFile};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{sitemap::SitemapDocument, types::BuildError};

const FILE_PREFIX: &str = "sitemap-";

/// Writes sitemap documents to disk and hands back the single deliverable file.
pub struct ArchivePackager {
    dir: PathBuf,
}

impl ArchivePackager {
    pub fn new(dir: PathBuf) -> Self {
        ArchivePackager { dir }
    }

    /// One document is delivered as is; several are zipped together and the loose
    /// `.xml` files removed. Nothing written by a failed call is left behind.
    pub fn package(&self, documents: &[SitemapDocument]) -> Result<PathBuf, BuildError> {
        let mut files = vec![];
        for document in documents {
            match self.write_document(document) {
                Ok(path) => files.push(path),
                Err(e) => {
                    remove_all(&files);
                    return Err(e);
                }
            }
        }

        if files.len() == 1 {
            debug!("single sitemap written to {:?}", files[0]);
            return Ok(files.remove(0));
        }

        let archive = self.zip(&files);
        // whatever zip() did not consume is removed here
        remove_all(&files);
        archive
    }

    fn write_document(&self, document: &SitemapDocument) -> Result<PathBuf, BuildError> {
        let xml = document.to_xml()?;
        let mut file = Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(".xml")
            .tempfile_in(&self.dir)?;
        file.write_all(xml.as_bytes())?;
        let (_, path) = file.keep().map_err(|e| BuildError::Io(e.error))?;
        debug!("wrote {} urls to {:?}", document.len(), path);
        Ok(path)
    }

    fn zip(&self, files: &[PathBuf]) -> Result<PathBuf, BuildError> {
        let mut archive: NamedTempFile = Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(".zip")
            .tempfile_in(&self.dir)?;

        {
            let mut zip = ZipWriter::new(archive.as_file_mut());
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            for file in files {
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| BuildError::Archive(format!("invalid file name {:?}", file)))?;
                zip.start_file(name, options)
                    .map_err(|e| BuildError::Archive(e.to_string()))?;
                zip.write_all(&fs::read(file)?)?;
                fs::remove_file(file)?;
            }

            zip.finish()
                .map_err(|e| BuildError::Archive(e.to_string()))?;
        }

        // only a finished archive is kept, dropping the temp file otherwise deletes it
        let (_, path) = archive.keep().map_err(|e| BuildError::Io(e.error))?;
        info!("{} sitemaps archived to {:?}", files.len(), path);
        Ok(path)
    }
}

fn remove_all(files: &[PathBuf]) {
    for file in files.iter().filter(|f| f.exists()) {
        if let Err(e) = fs::remove_file(file) {
            warn!("could not remove {:?}: {}", file, e);
        }
    }
}
