//! Minimal text-only PDF writer.
//!
//! One standard font (Courier), fixed line height, A4 pages. Enough for
//! statements; no images, no compression, no embedded fonts.

use std::fmt::Write as _;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN_LEFT: u32 = 40;
const MARGIN_TOP: u32 = 50;
const FONT_SIZE: u32 = 9;
const LEADING: u32 = 12;

/// Body lines that fit on one page, leaving room for the footer.
pub const LINES_PER_PAGE: usize = 60;

/// Escape a line for a PDF literal string. Non-ASCII characters become `?`
/// because the standard fonts only cover WinAnsi.
fn escape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(lines: &[String], footer: &str) -> String {
    let mut stream = String::new();
    let _ = writeln!(stream, "BT");
    let _ = writeln!(stream, "/F1 {FONT_SIZE} Tf");
    let _ = writeln!(stream, "{LEADING} TL");
    let _ = writeln!(stream, "{MARGIN_LEFT} {} Td", PAGE_HEIGHT - MARGIN_TOP);
    for line in lines {
        let _ = writeln!(stream, "({}) Tj T*", escape(line));
    }
    let _ = writeln!(stream, "ET");
    let _ = writeln!(stream, "BT");
    let _ = writeln!(stream, "/F1 {FONT_SIZE} Tf");
    let _ = writeln!(stream, "{MARGIN_LEFT} 30 Td");
    let _ = writeln!(stream, "({}) Tj", escape(footer));
    let _ = writeln!(stream, "ET");
    stream
}

/// Render pre-paginated lines. Every page gets a "Page i of n" footer; an
/// empty input still yields one blank page.
pub fn render(pages: &[Vec<String>]) -> Vec<u8> {
    let blank = [Vec::new()];
    let pages: &[Vec<String>] = if pages.is_empty() { &blank } else { pages };
    let page_count = pages.len();

    // 1 catalog, 2 page tree, 3 font, then a (page, contents) pair per page
    let mut objects: Vec<String> = Vec::with_capacity(3 + 2 * page_count);

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));

    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>".to_string());

    for (i, lines) in pages.iter().enumerate() {
        let contents_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {contents_id} 0 R >>"
        ));

        let stream = content_stream(lines, &format!("Page {} of {}", i + 1, page_count));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());

    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );

    out.into_bytes()
}

/// Split `body` into pages of at most `per_page` lines, repeating `header`
/// at the top of each page.
pub fn paginate(header: &[String], body: &[String], per_page: usize) -> Vec<Vec<String>> {
    let room = per_page.saturating_sub(header.len()).max(1);

    if body.is_empty() {
        return vec![header.to_vec()];
    }

    body.chunks(room)
        .map(|chunk| {
            let mut page = header.to_vec();
            page.extend_from_slice(chunk);
            page
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn escapes_delimiters_and_non_ascii() {
        assert_eq!(escape("a (b) \\ c"), "a \\(b\\) \\\\ c");
        assert_eq!(escape("café"), "caf?");
    }

    #[test]
    fn document_has_header_trailer_and_page_count() {
        let pdf = String::from_utf8(render(&[lines(3), lines(2)])).unwrap();
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.trim_end().ends_with("%%EOF"));
        assert!(pdf.contains("/Count 2"));
        assert!(pdf.contains("(Page 2 of 2) Tj"));
        assert!(pdf.contains("(line 2) Tj T*"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = render(&[lines(1)]);
        let pdf = String::from_utf8(bytes).unwrap();

        let xref_at: usize = pdf
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[xref_at..].starts_with("xref"));

        let entries: Vec<usize> = pdf[xref_at..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 5);
        for (i, offset) in entries.iter().enumerate() {
            assert!(pdf[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn empty_input_renders_one_page() {
        let pdf = String::from_utf8(render(&[])).unwrap();
        assert!(pdf.contains("/Count 1"));
        assert!(pdf.contains("(Page 1 of 1) Tj"));
    }

    #[test]
    fn pagination_repeats_header() {
        let header = vec!["HEADER".to_string()];
        let pages = paginate(&header, &lines(7), 4);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], vec!["HEADER", "line 0", "line 1", "line 2"]);
        assert_eq!(pages[2], vec!["HEADER", "line 6"]);

        assert_eq!(paginate(&header, &[], 4), vec![vec!["HEADER".to_string()]]);
    }
}
