//! Insert and add-page merges between packages.

mod common;

use common::{Workspace, read_bytes};
use idmlkit::part::designmap;
use idmlkit::{Error, Face, MergeOptions, Package, PartSource};

// ============================================================================
// insert
// ============================================================================

#[test]
fn test_insert_splices_branch_and_stories() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();
    let stories_before = dest.stories().len();

    dest.insert(&src, "/Root/article[1]", "/Root/module").unwrap();

    assert_eq!(dest.stories().len(), stories_before + 1);
    assert!(dest.stories().contains(&"Stories/Story_SRCu200.xml".to_string()));

    let manifest = dest.part("designmap.xml").unwrap();
    assert_eq!(
        designmap::story_list(manifest).last().map(String::as_str),
        Some("SRCu200")
    );
    assert!(designmap::story_refs(manifest).contains(&"Stories/Story_SRCu200.xml".to_string()));

    let tree = dest.structure().unwrap();
    let headline = tree.resolve("/Root/article[1]/module/headline").unwrap();
    assert_eq!(tree.node(headline).self_id(), "SRCdi2i3i1");
    let module = tree.resolve("/Root/article[1]/module").unwrap();
    assert_eq!(tree.descendants(module).len(), 2);

    let exported = dest.export_xml().unwrap();
    assert!(
        exported.contains("<article><title>Hello</title> world<module><headline>Breaking</headline> news</module></article>"),
        "{exported}"
    );
}

#[test]
fn test_insert_moves_source_items_onto_destination_anchor() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    dest.insert(&src, "/Root/article[1]", "/Root/module").unwrap();

    let spread = dest.part("Spreads/Spread_ub6.xml").unwrap();
    let frame = spread.get_by_id(Some("TextFrame"), "Self", "SRCu201").unwrap();
    assert_eq!(spread.attr(frame, "ItemTransform"), Some("1 0 0 1 -14 -10"));
    assert_eq!(spread.attr(frame, "ParentStory"), Some("SRCu200"));
    assert!(spread.get_by_id(Some("Page"), "Self", "SRCubb").is_none());
}

#[test]
fn test_insert_merges_catalogs() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    dest.insert(&src, "/Root/article[1]", "/Root/module").unwrap();

    assert_eq!(dest.font_families().unwrap(), vec!["Minion Pro", "Helvetica"]);
    assert_eq!(
        dest.style_groups().unwrap(),
        vec!["RootCharacterStyleGroup", "RootParagraphStyleGroup"]
    );
    let styles = dest.part("Resources/Styles.xml").unwrap();
    assert!(styles.get_by_id(Some("CharacterStyle"), "Self", "SRCCharacterStyle/headline").is_some());
    assert!(styles.get_by_id(Some("CharacterStyle"), "Self", "CharacterStyle/bold").is_some());

    let tags = dest.tags().unwrap();
    assert!(tags.contains(&"module".to_string()));
    assert!(tags.contains(&"headline".to_string()));
    assert_eq!(tags.iter().filter(|t| *t == "Root").count(), 1);

    assert_eq!(dest.style_mapping().unwrap().get("headline"), Some("SRCCharacterStyle/headline"));

    let graphic = dest.part("Resources/Graphic.xml").unwrap();
    assert!(graphic.get_by_id(Some("Color"), "Self", "SRCColor/Spot").is_some());

    let manifest = dest.part("designmap.xml").unwrap();
    let layers: Vec<&str> = designmap::layers(manifest)
        .into_iter()
        .filter_map(|l| manifest.attr(l, "Self"))
        .collect();
    assert_eq!(layers, vec!["uba", "SRCuba"]);
}

#[test]
fn test_insert_detects_collisions() {
    let ws = Workspace::new();
    let path = ws.magazine();
    let before = read_bytes(&path);
    let mut dest = Package::open(&path).unwrap();
    let src = Package::open(ws.module("module", "")).unwrap();

    let err = dest.insert(&src, "/Root/article[1]", "/Root/module").unwrap_err();
    match err {
        Error::CollisionDetected(ids) => assert!(ids.contains(&"di2i3".to_string()), "{ids:?}"),
        other => panic!("expected a collision, got {other:?}"),
    }
    assert_eq!(read_bytes(&path), before);
}

#[test]
fn test_insert_without_collision_check() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "")).unwrap();
    let options = MergeOptions {
        check_collisions: false,
    };

    dest.insert_with(&src, "/Root/article[2]", "/Root/module", &options).unwrap();
    assert!(dest.stories().contains(&"Stories/Story_u200.xml".to_string()));
}

#[test]
fn test_insert_drops_non_story_content_pointer() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    dest.insert(&src, "/Root/picture", "/Root/module").unwrap();

    let tree = dest.structure().unwrap();
    let picture = tree.resolve("/Root/picture").unwrap();
    assert_eq!(tree.node(picture).xml_content(), None);
    assert!(tree.resolve("/Root/picture/module/headline").is_ok());
}

#[test]
fn test_insert_unknown_path() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    let err = dest.insert(&src, "/Root/article[9]", "/Root/module").unwrap_err();
    assert!(matches!(err, Error::PathNotFound(ref p) if p == "/Root/article[9]"));
}

// ============================================================================
// add_page_from_idml
// ============================================================================

#[test]
fn test_add_page_fills_last_spread() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    dest.add_page_from_idml(&src, 1, "/Root/article[3]", "/Root/module").unwrap();

    let pages = dest.pages().unwrap();
    assert_eq!(pages.len(), 5);
    let last = &pages[4];
    assert_eq!(last.spread, "Spreads/Spread_uc3.xml");
    assert_eq!(last.page.self_id, "SRCubb");
    assert_eq!(last.page.face(), Face::Recto);

    let spread = dest.part("Spreads/Spread_uc3.xml").unwrap();
    assert_eq!(last.page.items(spread).unwrap().len(), 1);
    assert!(dest.structure().unwrap().resolve("/Root/article[3]/module").is_ok());
    assert!(dest.stories().contains(&"Stories/Story_SRCu200.xml".to_string()));
}

#[test]
fn test_add_pages_creates_new_spread() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let first = Package::open(ws.module("first", "A")).unwrap();
    let second = Package::open(ws.module("second", "B")).unwrap();

    dest.add_pages_from_idml(&[
        (&first, 1, "/Root/article[2]", "/Root/module"),
        (&second, 1, "/Root/article[3]", "/Root/module"),
    ])
    .unwrap();

    assert_eq!(
        dest.spreads(),
        vec![
            "Spreads/Spread_ub6.xml",
            "Spreads/Spread_ubc.xml",
            "Spreads/Spread_uc3.xml",
            "Spreads/Spread_uc4.xml"
        ]
    );

    let spread = dest.part("Spreads/Spread_uc4.xml").unwrap();
    let spread_el = spread.first_child_named(spread.root(), "Spread").unwrap();
    assert_eq!(spread.attr(spread_el, "Self"), Some("uc4"));

    let pages = dest.pages().unwrap();
    assert_eq!(pages.len(), 6);
    let last = &pages[5];
    assert_eq!(last.spread, "Spreads/Spread_uc4.xml");
    assert_eq!(last.page.face(), Face::Verso);
    assert_eq!(last.page.coordinates().x1.to_string(), "-612");

    let frame = spread.get_by_id(Some("TextFrame"), "Self", "Bu201").unwrap();
    assert_eq!(spread.attr(frame, "ItemTransform"), Some("1 0 0 1 -612 0"));
}

#[test]
fn test_add_page_out_of_range() {
    let ws = Workspace::new();
    let path = ws.magazine();
    let before = read_bytes(&path);
    let mut dest = Package::open(&path).unwrap();
    let src = Package::open(ws.module("module", "SRC")).unwrap();

    let err = dest
        .add_page_from_idml(&src, 2, "/Root/article[3]", "/Root/module")
        .unwrap_err();
    assert!(matches!(err, Error::PageOutOfRange { page: 2, count: 1 }));
    assert_eq!(read_bytes(&path), before);
}

// ============================================================================
// Layers and content pointers
// ============================================================================

#[test]
fn test_insert_drops_unused_layers_and_their_guides() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module_with_spare_layer("module", "SRC")).unwrap();
    assert_eq!(src.layers().unwrap(), vec!["SRCuba", "SRCuff"]);

    dest.insert(&src, "/Root/article[1]", "/Root/module").unwrap();

    assert_eq!(dest.layers().unwrap(), vec!["uba", "SRCuba"]);
    assert_eq!(dest.active_layer().unwrap().as_deref(), Some("uba"));
    let spread = dest.part("Spreads/Spread_ub6.xml").unwrap();
    assert!(spread.get_by_id(Some("TextFrame"), "Self", "SRCu201").is_some());
    assert!(spread.get_by_id(Some("Guide"), "ItemLayer", "SRCuff").is_none());
}

#[test]
fn test_insert_drops_children_of_element_with_content() {
    let ws = Workspace::new();
    let mut dest = Package::open(ws.magazine()).unwrap();
    let src = Package::open(ws.module_with_figure("figure", "SRC")).unwrap();

    dest.insert(&src, "/Root/article[2]", "/Root/figure").unwrap();

    let story = dest.part("Stories/Story_u11b.xml").unwrap();
    let figure = story.get_by_id(Some("XMLElement"), "Self", "SRCdi2i4").unwrap();
    assert_eq!(story.attr(figure, "XMLContent"), Some("SRCu1e0"));
    assert_eq!(story.element_children(figure).count(), 0);
    assert!(story.get_by_id(Some("XMLElement"), "Self", "SRCdi2i4i1").is_none());

    let spread = dest.part("Spreads/Spread_ubc.xml").unwrap();
    assert!(spread.get_by_id(Some("Rectangle"), "Self", "SRCu1e0").is_some());
    assert!(dest.structure().unwrap().resolve("/Root/article[2]/figure").is_ok());
}
