// Remote path helpers shared by listing and the CLI

/// Join a remote directory and an entry name with a single `/`.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "." {
        name.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Last component of a remote path.
pub fn remote_file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/data/", "a.txt"), "/data/a.txt");
        assert_eq!(join_remote("/", "a.txt"), "/a.txt");
        assert_eq!(join_remote(".", "a.txt"), "a.txt");
    }

    #[test]
    fn test_remote_file_name() {
        assert_eq!(remote_file_name("/data/report.pdf"), "report.pdf");
        assert_eq!(remote_file_name("report.pdf"), "report.pdf");
        assert_eq!(remote_file_name("/data/dir/"), "dir");
    }
}
