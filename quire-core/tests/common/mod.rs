//! Fixture builders shared by the integration tests

#![allow(dead_code)]

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::{pdf_bytes as pdf, zip_bytes};

/// Entries of an EPUB 3 with two chapters, before zipping
pub fn epub_entries(title: &str, language: &str) -> Vec<(&'static str, Vec<u8>)> {
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:7d3c1a52-6a0e-4c59-9c3a-5b2f0e8d1f44</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>Ada Writer</dc:creator>
    <dc:language>{language}</dc:language>
    <dc:publisher>Quiet Press</dc:publisher>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#
    );
    let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc"><ol>
  <li><a href="text/ch1.xhtml">One</a></li>
  <li><a href="text/ch2.xhtml">Two</a></li>
</ol></nav></body></html>"#;
    let chapter = |body: &str| {
        format!(r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>{body}</body></html>"#)
            .into_bytes()
    };

    vec![
        ("mimetype", b"application/epub+zip".to_vec()),
        (
            "META-INF/container.xml",
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#
                .to_vec(),
        ),
        ("OEBPS/content.opf", opf.into_bytes()),
        ("OEBPS/nav.xhtml", nav.as_bytes().to_vec()),
        ("OEBPS/text/ch1.xhtml", chapter(&"<p>Lorem ipsum dolor sit amet.</p>".repeat(60))),
        ("OEBPS/text/ch2.xhtml", chapter("<p>The end.</p>")),
        ("OEBPS/style.css", b"p { margin: 0 }".to_vec()),
    ]
}

/// Zipped EPUB 3 with two chapters
pub fn epub(title: &str, language: &str) -> Vec<u8> {
    zip_bytes(&epub_entries(title, language))
}

/// Comic archive with the given number of (fake) PNG pages
pub fn cbz(pages: usize) -> Vec<u8> {
    let names: Vec<String> = (1..=pages).map(|n| format!("page-{n:03}.png")).collect();
    let entries: Vec<(&str, &[u8])> = names
        .iter()
        .map(|name| (name.as_str(), b"\x89PNG\r\n\x1a\n".as_slice()))
        .collect();
    zip_bytes(&entries)
}
