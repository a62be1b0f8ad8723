//! Packaging of downloaded chapters
//!
//! A chapter directory can be packed into a CBZ (a zip archive of the images
//! in reading order) or a PDF with one page per image. Packaging runs after
//! a chapter finishes and is not part of the download core; callers on an
//! async runtime should run it on a blocking thread.

use std::collections::btree_map::{BTreeMap, Entry};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::app::client::download::temp_path_for;
use crate::app::models::is_image_file;
use crate::constants::files;
use crate::errors::{PackageError, PackageResult};

/// Non-fatal problems met while removing packaged images
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted
    pub removed: usize,
    /// Files that could not be deleted, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// True when every requested deletion succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of packaging one chapter directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedChapter {
    /// The CBZ or PDF written
    pub path: PathBuf,
    pub image_count: usize,
    pub cleanup: CleanupReport,
}

/// Image files directly inside `dir`, sorted by file stem
///
/// When several files share a stem (`001.png` and `001.jpg` left by an
/// earlier run) only the most recently modified one is kept, ties going to
/// the extension listed first in `IMAGE_EXTENSIONS`.
pub fn collect_images(dir: &Path) -> PackageResult<Vec<PathBuf>> {
    let mut by_stem: BTreeMap<OsString, (PathBuf, Option<SystemTime>)> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_image_file(&path) {
            continue;
        }

        let modified = entry.metadata()?.modified().ok();
        let stem = path.file_stem().unwrap_or_default().to_os_string();

        match by_stem.entry(stem) {
            Entry::Occupied(mut occupied) => {
                let kept = occupied.get_mut();
                let newer = (modified, extension_rank(&kept.0)) > (kept.1, extension_rank(&path));
                let skipped = if newer {
                    std::mem::replace(kept, (path, modified)).0
                } else {
                    path
                };
                debug!("Skipping duplicate page {}", skipped.display());
            }
            Entry::Vacant(vacant) => {
                vacant.insert((path, modified));
            }
        }
    }

    Ok(by_stem.into_values().map(|(path, _)| path).collect())
}

/// Position of the path's extension in `IMAGE_EXTENSIONS`; lower is preferred
fn extension_rank(path: &Path) -> usize {
    let dotted = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    files::IMAGE_EXTENSIONS
        .iter()
        .position(|ext| *ext == dotted)
        .unwrap_or(files::IMAGE_EXTENSIONS.len())
}

/// Default output location: `<dir>.<extension>` beside the directory
pub fn default_output_path(dir: &Path, extension: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| files::UNTITLED.to_string());
    dir.with_file_name(format!("{}.{}", name, extension))
}

/// Pack the images in `dir` into a CBZ archive
///
/// Writes to `output` or, when absent, `<dir>.cbz`. With `delete_images`
/// the packaged images are removed afterwards; deletion failures land in
/// the returned `CleanupReport` instead of failing the call.
pub fn package_cbz(
    dir: &Path,
    output: Option<&Path>,
    delete_images: bool,
) -> PackageResult<PackagedChapter> {
    package_with(dir, output, files::CBZ_EXTENSION, delete_images, write_archive)
}

/// Render the images in `dir` into a PDF, one page per image
///
/// Pages are sized to the image in points. Every image is decoded,
/// transparent areas are flattened onto white, and the page is embedded as
/// a JPEG. Output and cleanup follow [`package_cbz`], with `<dir>.pdf` as
/// the default location.
pub fn package_pdf(
    dir: &Path,
    output: Option<&Path>,
    delete_images: bool,
) -> PackageResult<PackagedChapter> {
    package_with(dir, output, files::PDF_EXTENSION, delete_images, write_pdf)
}

fn package_with(
    dir: &Path,
    output: Option<&Path>,
    extension: &str,
    delete_images: bool,
    write: fn(&Path, &[PathBuf]) -> PackageResult<()>,
) -> PackageResult<PackagedChapter> {
    let images = collect_images(dir)?;
    if images.is_empty() {
        return Err(PackageError::NoImages {
            path: dir.to_path_buf(),
        });
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(dir, extension));

    // Written beside the target, then renamed into place
    let temp_path = temp_path_for(&path);
    let written = write(&temp_path, &images).and_then(|()| {
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    });
    if let Err(e) = written {
        if let Err(remove_err) = std::fs::remove_file(&temp_path) {
            debug!(
                "No partial output to remove at {}: {}",
                temp_path.display(),
                remove_err
            );
        }
        return Err(e);
    }

    info!("Packaged {} images into {}", images.len(), path.display());

    let cleanup = if delete_images {
        remove_images(&images)
    } else {
        CleanupReport::default()
    };

    Ok(PackagedChapter {
        path,
        image_count: images.len(),
        cleanup,
    })
}

fn write_archive(archive: &Path, images: &[PathBuf]) -> PackageResult<()> {
    let file = File::create(archive)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for image in images {
        let name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(name, options)?;
        let mut source = File::open(image)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

fn write_pdf(output: &Path, images: &[PathBuf]) -> PackageResult<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(images.len());
    for image in images {
        let page = encode_page(image)?;
        kids.push(Object::Reference(add_page(&mut doc, pages_id, page)?));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => images.len() as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut writer = BufWriter::new(File::create(output)?);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// One page's JPEG data and pixel size
struct EncodedPage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

fn encode_page(path: &Path) -> PackageResult<EncodedPage> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let rgb = flatten_onto_white(decoded);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, files::PDF_JPEG_QUALITY).encode_image(&rgb)?;

    Ok(EncodedPage {
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
    })
}

/// RGB copy of `image` with any alpha composited over white
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (source, target) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = source.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        *target = Rgb([blend(r), blend(g), blend(b)]);
    }
    rgb
}

fn add_page(doc: &mut Document, pages_id: ObjectId, page: EncodedPage) -> PackageResult<ObjectId> {
    let width = i64::from(page.width);
    let height = i64::from(page.height);

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        page.jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    }))
}

fn remove_images(images: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for image in images {
        match std::fs::remove_file(image) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!("Could not delete {}: {}", image.display(), e);
                report.failures.push((image.clone(), e.to_string()));
            }
        }
    }
    report
}
