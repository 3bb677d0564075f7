//! File and directory helpers. Every failure carries the path involved.
use crate::error::{Error, Result};
use crate::template::Substitutions;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Fail with [Error::FileNotFound] unless `path` is an existing file.
pub fn require_file(path: &Utf8Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::FileNotFound(path.to_owned()))
    }
}

/// The file name of `path` without its extension.
pub fn file_prefix(path: &Utf8Path) -> Result<&str> {
    path.file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::usage(format!("no file name in `{path}`")))
}

/// The final component of `path`.
pub fn file_name(path: &Utf8Path) -> Result<&str> {
    path.file_name()
        .ok_or_else(|| Error::usage(format!("no file name in `{path}`")))
}

pub fn ensure_dir(dir: &Utf8Path) -> Result<()> {
    if !dir.is_dir() {
        log::debug!("mkdir {}", dir);
        fs::create_dir_all(dir)
            .map_err(|e| Error::fs(format!("creating {dir}"), e))?;
    }
    Ok(())
}

/// Copy `file` into `dir`, keeping its name.
pub fn copy_into(file: &Utf8Path, dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let dest = dir.join(file_name(file)?);
    copy_file(file, &dest)?;
    Ok(dest)
}

pub fn copy_file(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    require_file(from)?;
    log::debug!("cp {} {}", from, to);
    fs::copy(from, to)
        .map_err(|e| Error::fs(format!("copying {from} to {to}"), e))?;
    Ok(())
}

/// Files directly inside `dir` with extension `ext`, sorted by name.
pub fn files_with_extension(
    dir: &Utf8Path,
    ext: &str,
) -> Result<Vec<Utf8PathBuf>> {
    let entries = dir
        .read_dir_utf8()
        .map_err(|e| Error::fs(format!("listing {dir}"), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(format!("listing {dir}"), e))?;
        let path = entry.path();
        if path.is_file() && path.extension() == Some(ext) {
            files.push(path.to_owned());
        }
    }
    files.sort();
    Ok(files)
}

/// Subdirectories directly inside `dir`, sorted by name.
pub fn subdirectories(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let entries = dir
        .read_dir_utf8()
        .map_err(|e| Error::fs(format!("listing {dir}"), e))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(format!("listing {dir}"), e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path().to_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Write `contents` to `path`.
pub fn write(path: &Utf8Path, contents: &str) -> Result<()> {
    log::debug!("writing {}", path);
    fs::write(path, contents)
        .map_err(|e| Error::fs(format!("writing {path}"), e))
}

pub fn read(path: &Utf8Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_owned()),
        _ => Error::fs(format!("reading {path}"), e),
    })
}

/// Copy `from` to `to`, replacing placeholder tokens on the way.
pub fn rewrite(
    from: &Utf8Path,
    to: &Utf8Path,
    subst: &Substitutions,
) -> Result<()> {
    let text = read(from)?;
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        out.push_str(&subst.apply(line));
    }
    write(to, &out)
}

/// Copy the directory tree `from` to the new path `to`.
pub fn copy_tree(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    log::debug!("cp -r {} {}", from, to);
    let mut options = fs_extra::dir::CopyOptions::new();
    options.content_only = true;
    ensure_dir(to)?;
    fs_extra::dir::copy(from, to, &options).map_err(|source| {
        Error::Transfer {
            context: format!("copying {from} to {to}"),
            source,
        }
    })?;
    Ok(())
}

pub fn remove_tree(dir: &Utf8Path) -> Result<()> {
    if dir.exists() {
        log::debug!("rm -rf {}", dir);
        fs::remove_dir_all(dir)
            .map_err(|e| Error::fs(format!("removing {dir}"), e))?;
    }
    Ok(())
}

/// Move the directory `dir` into `parent`. If `parent` already holds an
/// entry of that name, a numeric suffix is added. Returns the new path.
pub fn relocate(dir: &Utf8Path, parent: &Utf8Path) -> Result<Utf8PathBuf> {
    ensure_dir(parent)?;
    let name = file_name(dir)?;
    let mut dest = parent.join(name);
    let mut n = 1;
    while dest.exists() {
        dest = parent.join(format!("{name}-{n}"));
        n += 1;
    }
    log::debug!("mv {} {}", dir, dest);
    if fs::rename(dir, &dest).is_err() {
        // Different file systems: copy, then delete.
        copy_tree(dir, &dest)?;
        remove_tree(dir)?;
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn prefixes() {
        assert_eq!(file_prefix(Utf8Path::new("dir/fir.c")).unwrap(), "fir");
        assert_eq!(
            file_prefix(Utf8Path::new("fir-hicirrf.c")).unwrap(),
            "fir-hicirrf"
        );
        assert!(file_prefix(Utf8Path::new("")).is_err());
    }

    #[test]
    fn listing_by_extension() {
        let (_tmp, dir) = scratch();
        for name in ["b.vhd", "a.vhd", "a.c", "notes"] {
            fs::write(dir.join(name), "").unwrap();
        }
        fs::create_dir(dir.join("sub.vhd")).unwrap();
        let found = files_with_extension(&dir, "vhd").unwrap();
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, ["a.vhd", "b.vhd"]);
        assert_eq!(subdirectories(&dir).unwrap(), [dir.join("sub.vhd")]);
    }

    #[test]
    fn relocation_avoids_collisions() {
        let (_tmp, root) = scratch();
        let done = root.join("done");
        for _ in 0..2 {
            let job = root.join("job7");
            fs::create_dir(&job).unwrap();
            fs::write(job.join("FAILED"), "6\n").unwrap();
            relocate(&job, &done).unwrap();
            assert!(!job.exists());
        }
        assert!(done.join("job7/FAILED").is_file());
        assert!(done.join("job7-1/FAILED").is_file());
    }

    #[test]
    fn missing_file() {
        let (_tmp, dir) = scratch();
        let err = copy_into(&dir.join("nope.c"), &dir).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
