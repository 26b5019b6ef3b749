// The Word report: a minimal WordprocessingML package written with zip.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;

use quick_xml::escape::escape;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dash::chart::{ChartImage, ChartSet};
use crate::dash::*;

pub const REPORT_TITLE: &str = "BÁO CÁO PHÂN TÍCH";
pub const FULL_TABLE_HEADING: &str = "Bảng dữ liệu tổng:";
pub const FULL_CHART_CAPTION: &str = "Biểu đồ kết quả thực hiện tổng:";
pub const TOP_CAPTION: &str = "Top 3 cao nhất:";
pub const BOTTOM_CAPTION: &str = "Bottom 3 thấp nhất:";

/// 5.5 inches in EMU.
const IMAGE_WIDTH_EMU: u64 = 5_029_200;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Default Extension="png" ContentType="image/png"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="22"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style>
</w:styles>"#;

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">
<w:body>
"#;

const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1134" w:bottom="1440" w:left="1134" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>
</w:body>
</w:document>"#;

/// The ordered blocks of the report body.
#[derive(Debug, Clone)]
enum Block<'a> {
    Title(&'a str),
    Heading(&'a str),
    Paragraph(&'a str),
    Table {
        columns: &'static [&'static str],
        rows: Vec<Vec<String>>,
    },
    Picture {
        media_idx: usize,
        image: &'a ChartImage,
    },
}

fn report_blocks<'a, R: KpiRecord>(analysis: &Analysis<R>, charts: &'a ChartSet) -> Vec<Block<'a>> {
    let table = |rows: &[R]| Block::Table {
        columns: R::columns(),
        rows: rows.iter().map(|r| r.cells()).collect(),
    };
    vec![
        Block::Title(REPORT_TITLE),
        Block::Heading(FULL_TABLE_HEADING),
        table(&analysis.full),
        Block::Paragraph(FULL_CHART_CAPTION),
        Block::Picture {
            media_idx: 1,
            image: &charts.all,
        },
        Block::Paragraph(TOP_CAPTION),
        table(&analysis.top),
        Block::Picture {
            media_idx: 2,
            image: &charts.top,
        },
        Block::Paragraph(BOTTOM_CAPTION),
        table(&analysis.bottom),
        Block::Picture {
            media_idx: 3,
            image: &charts.bottom,
        },
    ]
}

fn run_xml(text: &str, bold: bool) -> String {
    format!(
        "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        if bold { "<w:rPr><w:b/></w:rPr>" } else { "" },
        escape(text)
    )
}

fn styled_paragraph(style: Option<&str>, text: &str) -> String {
    match style {
        Some(s) => format!(
            "<w:p><w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>{}</w:p>\n",
            s,
            run_xml(text, false)
        ),
        None => format!("<w:p>{}</w:p>\n", run_xml(text, false)),
    }
}

fn table_xml(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut xml = String::new();
    let _ = write!(
        xml,
        "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>"
    );
    for _ in columns {
        let _ = write!(xml, "<w:gridCol/>");
    }
    let _ = write!(xml, "</w:tblGrid>");

    let mut push_row = |cells: Vec<&str>, header: bool| {
        let _ = write!(xml, "<w:tr>");
        for c in cells {
            let _ = write!(xml, "<w:tc><w:p>{}</w:p></w:tc>", run_xml(c, header));
        }
        let _ = write!(xml, "</w:tr>");
    };
    push_row(columns.to_vec(), true);
    for row in rows {
        push_row(row.iter().map(|s| s.as_str()).collect(), false);
    }
    let _ = writeln!(xml, "</w:tbl>");
    // Word needs a paragraph between two consecutive tables or pictures.
    let _ = writeln!(xml, "<w:p/>");
    xml
}

fn picture_xml(media_idx: usize, image: &ChartImage) -> String {
    let cx = IMAGE_WIDTH_EMU;
    let cy = if image.width == 0 {
        0
    } else {
        IMAGE_WIDTH_EMU * image.height as u64 / image.width as u64
    };
    let name = format!("chart{}.png", media_idx);
    format!(
        "<w:p><w:r><w:drawing><wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">\
<wp:extent cx=\"{cx}\" cy=\"{cy}\"/><wp:docPr id=\"{id}\" name=\"{name}\"/>\
<a:graphic><a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">\
<pic:pic><pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"{name}\"/><pic:cNvPicPr/></pic:nvPicPr>\
<pic:blipFill><a:blip r:embed=\"rIdImage{id}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>\
<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>\
</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>\n",
        cx = cx,
        cy = cy,
        id = media_idx,
        name = name
    )
}

fn document_xml(blocks: &[Block]) -> String {
    let mut xml = String::from(DOCUMENT_OPEN);
    for block in blocks {
        match block {
            Block::Title(t) => xml.push_str(&styled_paragraph(Some("Title"), t)),
            Block::Heading(t) => xml.push_str(&styled_paragraph(Some("Heading1"), t)),
            Block::Paragraph(t) => xml.push_str(&styled_paragraph(None, t)),
            Block::Table { columns, rows } => xml.push_str(&table_xml(columns, rows)),
            Block::Picture { media_idx, image } => xml.push_str(&picture_xml(*media_idx, image)),
        }
    }
    xml.push_str(DOCUMENT_CLOSE);
    xml
}

fn document_rels(blocks: &[Block]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\n\
<Relationship Id=\"rIdStyles\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n",
    );
    for block in blocks {
        if let Block::Picture { media_idx, .. } = block {
            let _ = writeln!(
                xml,
                "<Relationship Id=\"rIdImage{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"media/chart{}.png\"/>",
                media_idx, media_idx
            );
        }
    }
    xml.push_str("</Relationships>");
    xml
}

/// Writes the report at `path`, replacing any previous file.
pub fn write_report<R: KpiRecord>(
    path: &Path,
    analysis: &Analysis<R>,
    charts: &ChartSet,
) -> DashResult<PathBuf> {
    let path_s = path.display().to_string();
    let blocks = report_blocks(analysis, charts);
    debug!("write_report: path: {:?} blocks: {:?}", path_s, blocks.len());

    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".to_string(), CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels".to_string(), PACKAGE_RELS.as_bytes().to_vec()),
        ("word/document.xml".to_string(), document_xml(&blocks).into_bytes()),
        ("word/styles.xml".to_string(), STYLES.as_bytes().to_vec()),
        (
            "word/_rels/document.xml.rels".to_string(),
            document_rels(&blocks).into_bytes(),
        ),
    ];
    for block in blocks.iter() {
        if let Block::Picture { media_idx, image } = block {
            parts.push((format!("word/media/chart{}.png", media_idx), image.png.clone()));
        }
    }

    let file = File::create(path).context(WritingOutputSnafu {
        path: path_s.clone(),
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in parts.iter() {
        writer
            .start_file(name.as_str(), options)
            .context(ZipReportSnafu {
                path: path_s.clone(),
            })?;
        writer.write_all(bytes).context(WritingOutputSnafu {
            path: path_s.clone(),
        })?;
    }
    writer.finish().context(ZipReportSnafu {
        path: path_s.clone(),
    })?;
    info!("Report written to {:?}", path_s);
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fake_chart(tag: u8) -> ChartImage {
        ChartImage {
            png: vec![137, 80, 78, 71, tag],
            width: 640,
            height: 480,
        }
    }

    fn charts() -> ChartSet {
        ChartSet {
            all: fake_chart(1),
            top: fake_chart(2),
            bottom: fake_chart(3),
        }
    }

    fn ticket(unit: &str, processed: f64, late: f64) -> TicketRecord {
        TicketRecord {
            stt: Cell::Empty,
            unit: unit.to_string(),
            processed,
            late,
            late_ratio: Cell::Empty,
            late_pct: round2(late / processed * 100.0),
        }
    }

    fn analysis() -> Analysis<TicketRecord> {
        let classifier = SubstringClassifier::default();
        let ranked = rank_rows(
            vec![
                ticket("Đội A & B", 100.0, 10.0),
                ticket("Đội C", 100.0, 1.0),
                ticket("Công ty Điện lực", 200.0, 11.0),
            ],
            &classifier,
        );
        run_analysis(&ranked, &classifier, &UnitFilter::All)
    }

    fn read_part(path: &Path, name: &str) -> Vec<u8> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("Bao_cao_Yeu_cau_KH.docx");
        let written = write_report(&p, &analysis(), &charts()).unwrap();
        assert_eq!(written, p);

        let doc = String::from_utf8(read_part(&p, "word/document.xml")).unwrap();
        let pos = |s: &str| doc.find(s).unwrap();
        assert!(pos(REPORT_TITLE) < pos(FULL_TABLE_HEADING));
        assert!(pos(FULL_TABLE_HEADING) < pos(LATE_PCT));
        assert!(pos(LATE_PCT) < pos(FULL_CHART_CAPTION));
        assert!(pos(FULL_CHART_CAPTION) < pos("rIdImage1"));
        assert!(pos("rIdImage1") < pos(TOP_CAPTION));
        assert!(pos(TOP_CAPTION) < pos("rIdImage2"));
        assert!(pos("rIdImage2") < pos(BOTTOM_CAPTION));
        assert!(pos(BOTTOM_CAPTION) < pos("rIdImage3"));
        // Only the table heading uses a heading style.
        assert_eq!(doc.matches("<w:pStyle w:val=\"Heading1\"/>").count(), 1);
        for caption in [FULL_CHART_CAPTION, TOP_CAPTION, BOTTOM_CAPTION] {
            let plain = format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", caption);
            assert!(doc.contains(&plain), "{} is not a plain paragraph", caption);
        }
        assert!(doc.contains("Đội A &amp; B"));
        assert!(doc.contains("cy=\"3771900\""));
        // Header row plus 3 data rows, then 1 + 2 and 1 + 2.
        assert_eq!(doc.matches("<w:tr>").count(), 10);

        assert_eq!(read_part(&p, "word/media/chart1.png"), fake_chart(1).png);
        assert_eq!(read_part(&p, "word/media/chart3.png"), fake_chart(3).png);
        let rels = String::from_utf8(read_part(&p, "word/_rels/document.xml.rels")).unwrap();
        assert_eq!(rels.matches("media/chart").count(), 3);
    }

    #[test]
    fn report_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("Bao_cao_App_CSKH.docx");
        fs::write(&p, b"stale").unwrap();
        write_report(&p, &analysis(), &charts()).unwrap();
        let archive = zip::ZipArchive::new(File::open(&p).unwrap()).unwrap();
        assert_eq!(archive.len(), 8);
    }
}
