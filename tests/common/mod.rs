//! Fixture packages built at test time.
//!
//! Each fixture is written as an extracted directory tree and packed with
//! `Package::create_from_dir`, so the tests exercise the real archive path.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use idmlkit::Package;
use tempfile::TempDir;

pub const IDPKG: &str = "http://ns.adobe.com/AdobeInDesign/idml/1.0/packaging";

const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Temporary directory owning the fixture archives of one test.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `files` below `<name>.d/` and pack them into `<name>.idml`.
    pub fn build(&self, name: &str, files: &[(String, String)]) -> PathBuf {
        let src = self.path(&format!("{name}.d"));
        for (member, contents) in files {
            let dest = src.join(member);
            fs::create_dir_all(dest.parent().expect("member has a parent")).expect("Failed to create dirs");
            fs::write(&dest, contents).expect("Failed to write member");
        }
        let archive = self.path(&format!("{name}.idml"));
        Package::create_from_dir(&src, &archive).expect("Failed to pack fixture");
        archive
    }

    /// Four pages over three spreads with three story-backed articles, a
    /// placed picture and a sidebar whose content is not a story.
    pub fn magazine(&self) -> PathBuf {
        self.build("magazine", &magazine_files())
    }

    /// One page holding one story-backed module, prefixed with `token`.
    pub fn module(&self, name: &str, token: &str) -> PathBuf {
        self.prefixed(name, token, &module_files())
    }

    /// [`module`](Self::module) plus a layer `uff` that only a guide sits on.
    pub fn module_with_spare_layer(&self, name: &str, token: &str) -> PathBuf {
        let files = edit_files(module_files(), |member, contents| match member {
            "designmap.xml" => contents.replace(
                LAYER,
                &format!("{LAYER}<Layer Self=\"uff\" Name=\"Spare\" Visible=\"true\"/>\n"),
            ),
            "Spreads/Spread_u1f0.xml" => contents.replace(
                "</Spread>",
                "<Guide Self=\"u1f5\" ItemLayer=\"uff\" Orientation=\"Horizontal\" Location=\"100\"/>\n</Spread>",
            ),
            _ => contents,
        });
        self.prefixed(name, token, &files)
    }

    /// [`module`](Self::module) plus a `figure` whose content is a placed
    /// rectangle, with an inline `caption` child.
    pub fn module_with_figure(&self, name: &str, token: &str) -> PathBuf {
        let files = edit_files(module_files(), |member, contents| match member {
            "XML/BackingStory.xml" => contents.replace(
                "</XMLElement>\n</XmlStory>",
                r#"<XMLElement Self="di2i4" MarkupTag="XMLTag/figure" XMLContent="u1e0">
<XMLElement Self="di2i4i1" MarkupTag="XMLTag/caption"/>
</XMLElement>
</XMLElement>
</XmlStory>"#,
            ),
            "Spreads/Spread_u1f0.xml" => contents.replace(
                "</Spread>",
                r#"<Rectangle Self="u1e0" ContentType="GraphicType" ItemLayer="uba" ItemTransform="1 0 0 1 0 0">
<Properties><PathGeometry><GeometryPathType PathOpen="false"><PathPointArray>
<PathPointType Anchor="200 -200" LeftDirection="200 -200" RightDirection="200 -200"/>
</PathPointArray></GeometryPathType></PathGeometry></Properties>
</Rectangle>
</Spread>"#,
            ),
            _ => contents,
        });
        self.prefixed(name, token, &files)
    }

    fn prefixed(&self, name: &str, token: &str, files: &[(String, String)]) -> PathBuf {
        let path = self.build(name, files);
        if !token.is_empty() {
            let mut package = Package::open(&path).expect("Failed to open module");
            package.prefix(token).expect("Failed to prefix module");
        }
        path
    }
}

pub fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).expect("Failed to read archive")
}

const LAYER: &str = "<Layer Self=\"uba\" Name=\"Layer 1\" Visible=\"true\"/>\n";

fn edit_files<F>(files: Vec<(String, String)>, edit: F) -> Vec<(String, String)>
where
    F: Fn(&str, String) -> String,
{
    files
        .into_iter()
        .map(|(member, contents)| {
            let contents = edit(&member, contents);
            (member, contents)
        })
        .collect()
}

fn part(name: &str, body: &str) -> (String, String) {
    (name.to_string(), format!("{DECL}\n{body}"))
}

fn story(id: &str, body: &str) -> (String, String) {
    part(
        &format!("Stories/Story_{id}.xml"),
        &format!(
            r#"<idPkg:Story xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<Story Self="{id}" AppliedTOCStyle="n" TrackChanges="false" StoryTitle="$ID/" AppliedNamedGrid="n">
<StoryPreference OpticalMarginAlignment="false" OpticalMarginSize="12"/>
{body}
</Story>
</idPkg:Story>"#
        ),
    )
}

/// A rectangular text frame whose first anchor sits at `x y`.
fn text_frame(id: &str, story: &str, x: &str, y: &str) -> String {
    format!(
        r#"<TextFrame Self="{id}" ParentStory="{story}" ContentType="TextType" ItemLayer="uba" ItemTransform="1 0 0 1 0 0">
<Properties><PathGeometry><GeometryPathType PathOpen="false"><PathPointArray>
<PathPointType Anchor="{x} {y}" LeftDirection="{x} {y}" RightDirection="{x} {y}"/>
<PathPointType Anchor="{x} 0" LeftDirection="{x} 0" RightDirection="{x} 0"/>
</PathPointArray></GeometryPathType></PathGeometry></Properties>
</TextFrame>"#
    )
}

fn page(id: &str, tx: &str) -> String {
    format!(r#"<Page Self="{id}" Name="{id}" GeometricBounds="0 0 792 612" ItemTransform="1 0 0 1 {tx} -396"/>"#)
}

fn spread(id: &str, body: &str) -> (String, String) {
    part(
        &format!("Spreads/Spread_{id}.xml"),
        &format!(
            r#"<idPkg:Spread xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<Spread Self="{id}" PageCount="1" BindingLocation="1" ItemTransform="1 0 0 1 0 0">
<FlattenerPreference LineArtAndTextResolution="300"/>
{body}
</Spread>
</idPkg:Spread>"#
        ),
    )
}

fn common_files() -> Vec<(String, String)> {
    vec![
        ("mimetype".to_string(), "application/vnd.adobe.indesign-idml-package".to_string()),
        part(
            "META-INF/container.xml",
            r#"<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container" version="1.0"><rootfiles><rootfile full-path="designmap.xml" media-type="text/xml"/></rootfiles></container>"#,
        ),
        part(
            "Resources/Preferences.xml",
            &format!(r#"<idPkg:Preferences xmlns:idPkg="{IDPKG}" DOMVersion="7.5"><DocumentPreference PageHeight="792" PageWidth="612" FacingPages="true"/></idPkg:Preferences>"#),
        ),
        part(
            "MasterSpreads/MasterSpread_ub2.xml",
            &format!(r#"<idPkg:MasterSpread xmlns:idPkg="{IDPKG}" DOMVersion="7.5"><MasterSpread Self="ub2" Name="A-Master"/></idPkg:MasterSpread>"#),
        ),
    ]
}

fn designmap(story_list: &str, spreads: &[&str], stories: &[&str], with_mapping: bool) -> (String, String) {
    let mut body = format!(
        r#"<?aid style="50" type="document" readerVersion="6.0" featureSet="257" product="7.5(142)" ?>
<Document xmlns:idPkg="{IDPKG}" DOMVersion="7.5" Self="d" StoryList="{story_list}" ActiveLayer="uba">
<Language Self="Language/$ID/English%3a USA" Name="$ID/English: USA"/>
<idPkg:Graphic src="Resources/Graphic.xml"/>
<idPkg:Fonts src="Resources/Fonts.xml"/>
<idPkg:Styles src="Resources/Styles.xml"/>
<idPkg:Preferences src="Resources/Preferences.xml"/>
<idPkg:Tags src="XML/Tags.xml"/>
"#
    );
    if with_mapping {
        body.push_str("<idPkg:Mapping src=\"XML/Mapping.xml\"/>\n");
    }
    body.push_str(LAYER);
    body.push_str("<idPkg:MasterSpread src=\"MasterSpreads/MasterSpread_ub2.xml\"/>\n");
    for id in spreads {
        body.push_str(&format!("<idPkg:Spread src=\"Spreads/Spread_{id}.xml\"/>\n"));
    }
    body.push_str(&format!("<Section Self=\"uc1\" Length=\"1\" Name=\"\" PageStart=\"{}\"/>\n", "ubb"));
    body.push_str("<idPkg:BackingStory src=\"XML/BackingStory.xml\"/>\n");
    for id in stories {
        body.push_str(&format!("<idPkg:Story src=\"Stories/Story_{id}.xml\"/>\n"));
    }
    body.push_str("</Document>");

    ("designmap.xml".to_string(), format!("{DECL}\n{body}"))
}

fn plain_run(text: &str) -> String {
    format!(
        r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/NormalParagraphStyle">
<CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]" PointSize="12"><Properties><AppliedFont type="string">Minion Pro</AppliedFont></Properties>
<Content>{text}</Content>
</CharacterStyleRange>
</ParagraphStyleRange>"#
    )
}

pub fn magazine_files() -> Vec<(String, String)> {
    let mut files = common_files();
    files.push(designmap(
        "ue4 u102 u11b u139 u9c",
        &["ub6", "ubc", "uc3"],
        &["ue4", "u102", "u11b", "u139", "u9c"],
        true,
    ));

    files.push(spread(
        "ub6",
        &format!(
            r#"{}
{}
<Rectangle Self="u1d4" ContentType="GraphicType" ItemLayer="uba" ItemTransform="1 0 0 1 0 0">
<Properties><PathGeometry><GeometryPathType PathOpen="false"><PathPointArray>
<PathPointType Anchor="300 -300" LeftDirection="300 -300" RightDirection="300 -300"/>
</PathPointArray></GeometryPathType></PathGeometry></Properties>
<Image Self="u1d7" ItemTransform="1 0 0 1 300 -300"><Link Self="u1da" LinkResourceURI="file:///images/old.jpg"/></Image>
</Rectangle>"#,
            page("ubb", "0"),
            text_frame("u10a", "u102", "36", "-360")
        ),
    ));
    files.push(spread(
        "ubc",
        &format!(
            "{}\n{}\n{}\n{}",
            page("ubd", "-612"),
            page("ube", "0"),
            text_frame("u120", "u11b", "-500", "-300"),
            text_frame("u13a", "u139", "100", "-300")
        ),
    ));
    files.push(spread(
        "uc3",
        &format!(
            "{}\n{}\n{}",
            page("uc8", "-612"),
            text_frame("u9d", "u9c", "-400", "-300"),
            text_frame("ue5", "ue4", "-300", "-200")
        ),
    ));

    files.push(story(
        "u102",
        r#"<XMLElement Self="di2i3" MarkupTag="XMLTag/article">
<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/NormalParagraphStyle">
<CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]" PointSize="12"><Properties><AppliedFont type="string">Minion Pro</AppliedFont></Properties>
<XMLElement Self="di2i3i1" MarkupTag="XMLTag/title"><Content>Hello</Content></XMLElement>
<Content> world</Content>
</CharacterStyleRange>
</ParagraphStyleRange>
</XMLElement>"#,
    ));
    files.push(story(
        "u11b",
        &format!(r#"<XMLElement Self="di2i4" MarkupTag="XMLTag/article">{}</XMLElement>"#, plain_run("Second story")),
    ));
    files.push(story(
        "u139",
        &format!(
            r#"<XMLElement Self="di2i5" MarkupTag="XMLTag/article"><XMLAttribute Self="di2i5XMLAttributenid" Name="id" Value="3"/>{}</XMLElement>"#,
            plain_run("Third")
        ),
    ));
    files.push(story("u9c", &plain_run("Page number")));
    files.push(story("ue4", &plain_run("Folio")));

    files.push(part(
        "XML/BackingStory.xml",
        &format!(
            r#"<idPkg:BackingStory xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XmlStory Self="ucb" AppliedTOCStyle="n" TrackChanges="false" StoryTitle="$ID/" AppliedNamedGrid="n">
<XMLElement Self="di2" MarkupTag="XMLTag/Root">
<XMLElement Self="di2i3" MarkupTag="XMLTag/article" XMLContent="u102"/>
<XMLElement Self="di2i4" MarkupTag="XMLTag/article" XMLContent="u11b"/>
<XMLElement Self="di2i5" MarkupTag="XMLTag/article" XMLContent="u139"/>
<XMLElement Self="di2i6" MarkupTag="XMLTag/picture" XMLContent="u1d7"/>
<XMLElement Self="di2i7" MarkupTag="XMLTag/sidebar" XMLContent="u999">
<XMLElement Self="di2i7i1" MarkupTag="XMLTag/note"/>
</XMLElement>
</XMLElement>
<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/NormalParagraphStyle"/>
</XmlStory>
</idPkg:BackingStory>"#
        ),
    ));
    files.push(part(
        "XML/Tags.xml",
        &format!(
            r#"<idPkg:Tags xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XMLTag Self="XMLTag/Root" Name="Root"/>
<XMLTag Self="XMLTag/article" Name="article"/>
<XMLTag Self="XMLTag/title" Name="title"/>
<XMLTag Self="XMLTag/picture" Name="picture"/>
<XMLTag Self="XMLTag/sidebar" Name="sidebar"/>
<XMLTag Self="XMLTag/note" Name="note"/>
</idPkg:Tags>"#
        ),
    ));
    files.push(part(
        "XML/Mapping.xml",
        &format!(
            r#"<idPkg:Mapping xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XMLImportMap Self="di9" MarkupTag="XMLTag/bold" MappedStyle="CharacterStyle/bold"/>
<XMLImportMap Self="dia" MarkupTag="XMLTag/italic" MappedStyle="CharacterStyle/italic"/>
</idPkg:Mapping>"#
        ),
    ));
    files.push(part(
        "Resources/Styles.xml",
        &format!(
            r#"<idPkg:Styles xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<RootCharacterStyleGroup Self="u79">
<CharacterStyle Self="CharacterStyle/$ID/[No character style]" Name="$ID/[No character style]"/>
<CharacterStyle Self="CharacterStyle/bold" Name="bold" FontStyle="Bold"/>
<CharacterStyle Self="CharacterStyle/italic" Name="italic" FontStyle="Italic"/>
</RootCharacterStyleGroup>
</idPkg:Styles>"#
        ),
    ));
    files.push(part(
        "Resources/Fonts.xml",
        &format!(
            r#"<idPkg:Fonts xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<FontFamily Self="di6" Name="Minion Pro"><Font Self="di6FontnMinion Pro Regular" FontFamily="Minion Pro" Name="Minion Pro Regular"/></FontFamily>
</idPkg:Fonts>"#
        ),
    ));
    files.push(part(
        "Resources/Graphic.xml",
        &format!(
            r#"<idPkg:Graphic xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<Color Self="Color/Black" Model="Process" Space="CMYK" ColorValue="0 0 0 100" Name="Black"/>
</idPkg:Graphic>"#
        ),
    ));
    files
}

pub fn module_files() -> Vec<(String, String)> {
    let mut files = common_files();
    files.push(designmap("u200", &["u1f0"], &["u200"], true));

    files.push(spread(
        "u1f0",
        &format!("{}\n{}", page("ubb", "0"), text_frame("u201", "u200", "50", "-350")),
    ));
    files.push(story(
        "u200",
        r#"<XMLElement Self="di2i3" MarkupTag="XMLTag/module">
<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/NormalParagraphStyle">
<CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]" PointSize="10"><Properties><AppliedFont type="string">Helvetica</AppliedFont></Properties>
<XMLElement Self="di2i3i1" MarkupTag="XMLTag/headline"><Content>Breaking</Content></XMLElement>
<Content> news</Content>
</CharacterStyleRange>
</ParagraphStyleRange>
</XMLElement>"#,
    ));
    files.push(part(
        "XML/BackingStory.xml",
        &format!(
            r#"<idPkg:BackingStory xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XmlStory Self="u1fa" AppliedTOCStyle="n" TrackChanges="false" StoryTitle="$ID/" AppliedNamedGrid="n">
<XMLElement Self="di2" MarkupTag="XMLTag/Root">
<XMLElement Self="di2i3" MarkupTag="XMLTag/module" XMLContent="u200"/>
</XMLElement>
</XmlStory>
</idPkg:BackingStory>"#
        ),
    ));
    files.push(part(
        "XML/Tags.xml",
        &format!(
            r#"<idPkg:Tags xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XMLTag Self="XMLTag/Root" Name="Root"/>
<XMLTag Self="XMLTag/module" Name="module"/>
<XMLTag Self="XMLTag/headline" Name="headline"/>
</idPkg:Tags>"#
        ),
    ));
    files.push(part(
        "XML/Mapping.xml",
        &format!(
            r#"<idPkg:Mapping xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<XMLImportMap Self="dib" MarkupTag="XMLTag/headline" MappedStyle="CharacterStyle/headline"/>
</idPkg:Mapping>"#
        ),
    ));
    files.push(part(
        "Resources/Styles.xml",
        &format!(
            r#"<idPkg:Styles xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<RootCharacterStyleGroup Self="u79">
<CharacterStyle Self="CharacterStyle/$ID/[No character style]" Name="$ID/[No character style]"/>
<CharacterStyle Self="CharacterStyle/headline" Name="headline" PointSize="18"/>
</RootCharacterStyleGroup>
<RootParagraphStyleGroup Self="u78">
<ParagraphStyle Self="ParagraphStyle/$ID/NormalParagraphStyle" Name="$ID/NormalParagraphStyle"/>
</RootParagraphStyleGroup>
</idPkg:Styles>"#
        ),
    ));
    files.push(part(
        "Resources/Fonts.xml",
        &format!(
            r#"<idPkg:Fonts xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<FontFamily Self="di6" Name="Minion Pro"/>
<FontFamily Self="di7" Name="Helvetica"/>
</idPkg:Fonts>"#
        ),
    ));
    files.push(part(
        "Resources/Graphic.xml",
        &format!(
            r#"<idPkg:Graphic xmlns:idPkg="{IDPKG}" DOMVersion="7.5">
<Color Self="Color/Black" Model="Process" Space="CMYK" ColorValue="0 0 0 100" Name="Black"/>
<Color Self="Color/Spot" Model="Spot" Space="CMYK" ColorValue="100 0 0 0" Name="Spot"/>
</idPkg:Graphic>"#
        ),
    ));
    files
}
