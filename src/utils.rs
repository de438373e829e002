use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use regex::Regex;
use crate::error::DetectError;

/// Reads one class name per line; line `i` names class `i`. Only a trailing
/// `\r` is stripped, blank lines are kept as empty names.
pub fn load_class_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DetectError> {
    let path = path.as_ref();
    let to_err = |source| DetectError::ClassNames {
        path: path.to_path_buf(),
        source,
    };

    let file_in = fs::File::open(path).map_err(to_err)?;
    let mut names = Vec::new();
    for line in BufReader::new(file_in).lines() {
        let line = line.map_err(to_err)?;
        names.push(line.trim_end_matches('\r').to_string());
    }
    Ok(names)
}

/// Parses the `names` metadata entry exported alongside detectors.
///
/// String format: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ...}`
pub fn parse_names_metadata(names: &str) -> Vec<String> {
    let re = match Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) {
        Ok(re) => re,
        Err(_) => return vec![],
    };
    re.captures_iter(names)
        .map(|x| x.extract())
        .map(|(_, [_, name, _])| name.to_string())
        .collect()
}

pub fn placeholder_names(n: usize) -> Vec<String> {
    (0..n).map(|x| format!("# {}", x)).collect::<Vec<String>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn names_from_metadata() {
        let names = parse_names_metadata("{0: 'person', 1: 'bicycle', 2: 'sports ball'}");
        assert_eq!(names, vec!["person", "bicycle", "sports ball"]);
        assert!(parse_names_metadata("").is_empty());
    }

    #[test]
    fn placeholders() {
        assert_eq!(placeholder_names(2), vec!["# 0", "# 1"]);
    }

    #[test]
    fn names_file_keeps_blank_lines() {
        let path = std::env::temp_dir().join(format!("ppyoloe_names_{}.txt", std::process::id()));
        {
            let mut f = fs::File::create(&path).unwrap();
            write!(f, "person\r\n\r\nbicycle\ncar\n").unwrap();
        }
        let names = load_class_names(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(names, vec!["person", "", "bicycle", "car"]);
        assert_eq!(names[2], "bicycle");
    }

    #[test]
    fn missing_names_file() {
        let err = load_class_names("/nonexistent/coco.names").unwrap_err();
        assert!(matches!(err, DetectError::ClassNames { .. }));
        assert!(err.is_setup());
    }
}
