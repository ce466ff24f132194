use super::*;

fn titles(pages: &[&WikiPage]) -> Vec<String> {
    pages.iter().map(|p| p.title.clone()).collect()
}

#[test]
fn test_breadth_first_from_entry_page() {
    let pages = animal_pages();
    let ordered = order_pages(&pages, "Home", None, false).unwrap();
    assert_eq!(titles(&ordered), ["Home", "Cats", "Dogs", "Cows", "Puppies"]);
}

#[test]
fn test_orphans_appended_by_title() {
    let mut pages = animal_pages();
    pages.push(page(7, "Aardvark", "<p>alone</p>"));
    let ordered = order_pages(&pages, "Home", None, true).unwrap();
    assert_eq!(
        titles(&ordered),
        ["Home", "Cats", "Dogs", "Cows", "Puppies", "Aardvark", "Orphan"]
    );
}

#[test]
fn test_missing_entry_page() {
    let pages = animal_pages();
    let err = order_pages(&pages, "Start", None, false).unwrap_err();
    assert!(matches!(err, Error::NotFound(msg) if msg.contains("Start")));
}

#[test]
fn test_selection_keeps_traversal_order_then_selection_order() {
    let pages = animal_pages();
    let selection = vec![
        "Orphan".to_string(),
        "Cows".to_string(),
        "Nope".to_string(),
        "Home".to_string(),
        "Cows".to_string(),
    ];
    let ordered = order_pages(&pages, "Home", Some(selection.as_slice()), true).unwrap();
    assert_eq!(titles(&ordered), ["Home", "Cows", "Orphan"]);
}

#[test]
fn test_empty_selection_means_everything() {
    let pages = animal_pages();
    let selection: Vec<String> = Vec::new();
    let ordered = order_pages(&pages, "Home", Some(selection.as_slice()), false).unwrap();
    assert_eq!(ordered.len(), 5);
}

#[test]
fn test_prepare_rewrites_links_and_normalizes() {
    let pages = animal_pages();
    let ordered = order_pages(&pages, "Home", None, false).unwrap();
    let prepared = prepare_pages(&ordered);

    assert_eq!(
        prepared[0].html,
        "<p>Info about <a href=\"#page-cats\">Cats</a>, <a href=\"#page-dogs\">Dogs</a> \
         and <a href=\"#page-cows\">Cows</a></p>"
    );
    // Mice is not part of the export
    assert_eq!(
        prepared[1].html,
        "<p>Meow, unlike <a href=\"#page-dogs\">Dogs</a> or Mice</p>"
    );
    assert_eq!(prepared[3].html, "<p>Moo. Back to <a href=\"#page-home\">Home</a></p>");
    // Verbatim content is untouched
    assert_eq!(prepared[4].html, "<pre>\n[[not a link]]\n</pre>");
}

#[test]
fn test_colliding_anchors_get_suffix() {
    let pages = vec![
        page(1, "Home", "[[C++]] and [[C]]"),
        page(2, "C++", "plus plus"),
        page(3, "C", "plain"),
    ];
    let ordered = order_pages(&pages, "Home", None, false).unwrap();
    let prepared = prepare_pages(&ordered);

    assert_eq!(prepared[1].anchor, "page-c");
    assert_eq!(prepared[2].anchor, "page-c-2");
    assert_eq!(
        prepared[0].html,
        "<a href=\"#page-c\">C++</a> and <a href=\"#page-c-2\">C</a>"
    );
}

#[test]
fn test_filename_sanitising() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    assert_eq!(
        export_filename("Example wiki", date, ExportFormat::Pdf),
        "Export_Example_wiki_2026-10-18.pdf"
    );
    assert_eq!(
        export_filename("a/b\\c:d*e?f\"g<h>i|j", date, ExportFormat::Epub),
        "Export_a_b_c_d_e_f_g_h_i_j_2026-10-18.epub"
    );
    assert_eq!(
        export_filename("   ", date, ExportFormat::Pdf),
        "Export_wiki_2026-10-18.pdf"
    );
}
