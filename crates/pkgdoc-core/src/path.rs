//! Import path classification.
//!
//! [`valid_remote_path`] is a pure predicate: it runs before any network
//! access and rejects paths that `go get` would never accept.

use regex::Regex;
use std::sync::LazyLock;

/// Host segment: at least two dot-separated labels.
#[allow(clippy::unwrap_used)]
static VALID_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9]+(?:\.[-A-Za-z0-9]+)+").unwrap());

const BAD_TLDS: &[&str] = &[
    ".png", ".html", ".jpg", ".ico", ".txt", ".xml", ".go", ".gif",
];

const BAD_CHARS: &str = "!\"#$%&'()*,:;<=>?[]^`{|}";

/// Returns true if `import_path` is structurally valid for a remote package.
///
/// ```rust
/// use pkgdoc_core::valid_remote_path;
///
/// assert!(valid_remote_path("github.com/user/repo"));
/// assert!(!valid_remote_path("github.com/user/repo/testdata/x"));
/// ```
pub fn valid_remote_path(import_path: &str) -> bool {
    if import_path.chars().any(is_bad_char) {
        return false;
    }

    let mut parts = import_path.split('/');
    let host = parts.next().unwrap_or_default();
    if !VALID_HOST.is_match(host) {
        return false;
    }
    if BAD_TLDS.iter().any(|tld| host.ends_with(tld)) {
        return false;
    }

    parts.all(|part| !(part.is_empty() || part.starts_with(['.', '_']) || part == "testdata"))
}

fn is_bad_char(c: char) -> bool {
    c == char::REPLACEMENT_CHARACTER
        || (c as u32) < 0x20
        || c == '\u{7f}'
        || c == '\\'
        || c.is_whitespace()
        || BAD_CHARS.contains(c)
}

/// Whether `import_path` names a standard library package.
pub fn is_standard_package(import_path: &str) -> bool {
    STANDARD_PACKAGES.binary_search(&import_path).is_ok()
}

/// Standard library import paths, sorted.
pub const STANDARD_PACKAGES: &[&str] = &[
    "archive/tar",
    "archive/zip",
    "bufio",
    "builtin",
    "bytes",
    "compress/bzip2",
    "compress/flate",
    "compress/gzip",
    "compress/lzw",
    "compress/zlib",
    "container/heap",
    "container/list",
    "container/ring",
    "crypto",
    "crypto/aes",
    "crypto/cipher",
    "crypto/des",
    "crypto/dsa",
    "crypto/ecdsa",
    "crypto/elliptic",
    "crypto/hmac",
    "crypto/md5",
    "crypto/rand",
    "crypto/rc4",
    "crypto/rsa",
    "crypto/sha1",
    "crypto/sha256",
    "crypto/sha512",
    "crypto/subtle",
    "crypto/tls",
    "crypto/x509",
    "crypto/x509/pkix",
    "database/sql",
    "database/sql/driver",
    "debug/dwarf",
    "debug/elf",
    "debug/gosym",
    "debug/macho",
    "debug/pe",
    "encoding",
    "encoding/ascii85",
    "encoding/asn1",
    "encoding/base32",
    "encoding/base64",
    "encoding/binary",
    "encoding/csv",
    "encoding/gob",
    "encoding/hex",
    "encoding/json",
    "encoding/pem",
    "encoding/xml",
    "errors",
    "expvar",
    "flag",
    "fmt",
    "go/ast",
    "go/build",
    "go/doc",
    "go/format",
    "go/parser",
    "go/printer",
    "go/scanner",
    "go/token",
    "hash",
    "hash/adler32",
    "hash/crc32",
    "hash/crc64",
    "hash/fnv",
    "html",
    "html/template",
    "image",
    "image/color",
    "image/draw",
    "image/gif",
    "image/jpeg",
    "image/png",
    "index/suffixarray",
    "io",
    "io/ioutil",
    "log",
    "log/syslog",
    "math",
    "math/big",
    "math/cmplx",
    "math/rand",
    "mime",
    "mime/multipart",
    "net",
    "net/http",
    "net/http/cgi",
    "net/http/cookiejar",
    "net/http/fcgi",
    "net/http/httptest",
    "net/http/httputil",
    "net/http/pprof",
    "net/mail",
    "net/rpc",
    "net/rpc/jsonrpc",
    "net/smtp",
    "net/textproto",
    "net/url",
    "os",
    "os/exec",
    "os/signal",
    "os/user",
    "path",
    "path/filepath",
    "reflect",
    "regexp",
    "regexp/syntax",
    "runtime",
    "runtime/cgo",
    "runtime/debug",
    "runtime/pprof",
    "sort",
    "strconv",
    "strings",
    "sync",
    "sync/atomic",
    "syscall",
    "testing",
    "testing/iotest",
    "testing/quick",
    "text/scanner",
    "text/tabwriter",
    "text/template",
    "text/template/parse",
    "time",
    "unicode",
    "unicode/utf16",
    "unicode/utf8",
    "unsafe",
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_paths() {
        for path in [
            "github.com/user/repo",
            "camlistore.org",
            "code.google.com/p/go.net/websocket",
            "launchpad.net/~user/+junk/x",
            "example-host.co.uk/a/b-c/d.e",
        ] {
            assert!(valid_remote_path(path), "{path} should be valid");
        }
    }

    #[test]
    fn test_invalid_paths() {
        for path in [
            "",
            "foobar",
            "foo.",
            ".bar",
            "favicon.ico",
            "index.html",
            "github.com/user/repo/testdata/x",
            "github.com/user/repo/_ignore/x",
            "github.com/user/repo/.ignore/x",
            "github.com/user/repo/",
            "github.com//repo",
            "github.com/user/re po",
            "github.com/user/repo\\x",
            "github.com/user/repo\tx",
            "github.com/user/\u{7f}",
            "github.com/user/\u{fffd}",
            "github.com:8080/user/repo",
            "github.com/user/repo?x=1",
            "github.com/user/repo#frag",
        ] {
            assert!(!valid_remote_path(path), "{path:?} should be invalid");
        }
    }

    #[test]
    fn test_standard_packages_sorted_and_found() {
        assert!(STANDARD_PACKAGES.windows(2).all(|w| w[0] < w[1]));
        assert!(is_standard_package("fmt"));
        assert!(is_standard_package("net/http"));
        assert!(!is_standard_package("net/htt"));
        assert!(!is_standard_package("github.com/user/repo"));
    }

    #[test]
    fn test_standard_packages_are_not_remote() {
        assert!(STANDARD_PACKAGES.iter().all(|p| !valid_remote_path(p)));
    }

    proptest! {
        #[test]
        fn test_bad_punctuation_always_rejected(
            prefix in "[a-z]{1,8}\\.com/[a-z]{1,8}",
            bad in prop::sample::select(BAD_CHARS.chars().collect::<Vec<_>>()),
        ) {
            let path = format!("{prefix}{bad}x");
            prop_assert!(!valid_remote_path(&path));
        }

        #[test]
        fn test_well_formed_paths_accepted(
            host in "[a-z][a-z0-9-]{0,10}\\.(com|org|net|io)",
            segments in prop::collection::vec("[a-z][a-z0-9_.-]{0,10}", 0..4),
        ) {
            let mut path = host;
            for segment in &segments {
                if segment == "testdata" {
                    continue;
                }
                path.push('/');
                path.push_str(segment);
            }
            prop_assert!(valid_remote_path(&path));
        }
    }
}
