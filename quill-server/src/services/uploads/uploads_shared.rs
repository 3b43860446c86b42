use std::path::Path;

use quill_core::TenantContext;
use rand::Rng;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_SUFFIX_LEN: usize = 10;

/// Lower-cased extension with its dot, if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&ext.as_str())
        .then(|| format!(".{ext}"))
}

/// The tenant's upload directory name. Anything that could escape the
/// upload root collapses to `default`.
pub fn tenant_directory(tenant: &TenantContext) -> String {
    let dir = tenant.descriptor.directory.trim();
    let safe = !dir.is_empty()
        && dir
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !dir.starts_with('.');
    if safe {
        dir.to_string()
    } else {
        "default".to_string()
    }
}

/// `<unix seconds>-<10 random [a-z0-9]><ext>`
pub fn stored_file_name(unix: i64, ext: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    format!("{unix}-{suffix}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{TenantDescriptor, TenantId, TenantSource};

    fn tenant_with_directory(directory: &str) -> TenantContext {
        let descriptor = TenantDescriptor {
            directory: directory.into(),
            ..TenantDescriptor::default()
        };
        TenantContext {
            id: TenantId::new(descriptor.id.clone()),
            domain: String::new(),
            database: descriptor.database.clone(),
            descriptor,
            source: TenantSource::Mapped,
        }
    }

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(image_extension("cat.PNG").as_deref(), Some(".png"));
        assert_eq!(image_extension("a.b.webp").as_deref(), Some(".webp"));
        assert_eq!(image_extension("notes.txt"), None);
        assert_eq!(image_extension("jpg"), None);
    }

    #[test]
    fn directories_cannot_escape_the_upload_root() {
        assert_eq!(tenant_directory(&tenant_with_directory("acme_blog")), "acme_blog");
        assert_eq!(tenant_directory(&tenant_with_directory("../etc")), "default");
        assert_eq!(tenant_directory(&tenant_with_directory("..")), "default");
        assert_eq!(tenant_directory(&tenant_with_directory("")), "default");
    }

    #[test]
    fn file_names() {
        let name = stored_file_name(1_700_000_000, ".jpg");
        let (stamp, rest) = name.split_once('-').unwrap();
        assert_eq!(stamp, "1700000000");
        let suffix = rest.strip_suffix(".jpg").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
