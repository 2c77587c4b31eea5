use crate::error::{Result, StampError};
use crate::geometry::PageBox;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// US Letter, used when neither the page nor its ancestors carry a box.
const FALLBACK_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Walking more parents than this means the page tree has a cycle.
const MAX_TREE_DEPTH: usize = 64;

pub fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| StampError::Decode(e.to_string()))
}

pub fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| StampError::Serialize(e.to_string()))?;
    Ok(out)
}

pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(load(bytes)?.get_pages().len())
}

pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
    pages.into_values().collect()
}

/// Visible box of a page: CropBox if set, else MediaBox, both inheritable.
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let rect = inherited(doc, page_id, b"CropBox")
        .and_then(|obj| rect_from(doc, obj))
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|obj| rect_from(doc, obj)))
        .unwrap_or(FALLBACK_BOX);

    let (x0, x1) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
    let (y0, y1) = (rect[1].min(rect[3]), rect[1].max(rect[3]));
    PageBox {
        x0,
        y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Registers `id` under a fresh name in the page's own copy of its resources.
pub fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    prefix: &str,
    id: ObjectId,
) -> Result<String> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(obj) => resolve_to_dict(doc, obj)?,
        None => Dictionary::new(),
    };
    let mut entries = match resources.get(category) {
        Ok(obj) => resolve_to_dict(doc, obj)?,
        Err(_) => Dictionary::new(),
    };

    let name = unique_name(&entries, prefix);
    entries.set(name.clone(), Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Appends `content` to the page, after isolating the existing content in its
/// own `q ... Q` pair.
pub fn append_page_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| StampError::Decode(format!("página {page_id:?}: {e}")))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        let mut restored = b"\nQ\n".to_vec();
        restored.extend(content);
        let draw_id = doc.add_object(Stream::new(Dictionary::new(), restored));
        contents.push(Object::Reference(draw_id));
    } else {
        let draw_id = doc.add_object(Stream::new(Dictionary::new(), content));
        contents.push(Object::Reference(draw_id));
    }

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| StampError::Decode(format!("página {page_id:?}: {e}")))
}

fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| StampError::Decode(format!("referencia {id:?} no encontrada: {e}"))),
        other => Ok(other),
    }
}

fn resolve_to_dict(doc: &Document, obj: &Object) -> Result<Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Ok(d.clone()),
        Object::Stream(s) => Ok(s.dict.clone()),
        other => Err(StampError::Decode(format!("se esperaba diccionario, encontrado: {other:?}"))),
    }
}

fn rect_from(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let items = resolve(doc, obj).ok()?.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = number(resolve(doc, item).ok()?)?;
    }
    let degenerate = rect[0] == rect[2] || rect[1] == rect[3];
    (!degenerate).then_some(rect)
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

fn unique_name(entries: &Dictionary, prefix: &str) -> String {
    (0..)
        .map(|n| format!("{prefix}{n}"))
        .find(|name| !entries.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Two pages: the first inherits its MediaBox and Resources from the
    /// page tree, the second has its own offset CropBox.
    fn tree_doc() -> (Document, ObjectId, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let shared_font = doc.add_object(dictionary! { "F1" => "Helvetica" });
        let shared_res = doc.add_object(dictionary! {
            "Font" => Object::Reference(shared_font),
            "XObject" => dictionary! { "OvIm0" => Object::Null },
        });
        let content = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content),
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 400.into(), 400.into()],
            "CropBox" => vec![50.into(), 20.into(), 250.into(), 320.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first.into(), second.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => Object::Reference(shared_res),
            }),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog));
        (doc, first, second, shared_res)
    }

    #[test]
    fn boxes_are_inherited_and_cropped() {
        let (doc, first, second, _) = tree_doc();
        assert_eq!(page_box(&doc, first), PageBox::new(595.0, 842.0));
        assert_eq!(
            page_box(&doc, second),
            PageBox {
                x0: 50.0,
                y0: 20.0,
                width: 200.0,
                height: 300.0
            }
        );
    }

    #[test]
    fn missing_box_falls_back_to_letter() {
        let mut doc = Document::with_version("1.5");
        let page = doc.add_object(dictionary! { "Type" => "Page" });
        assert_eq!(page_box(&doc, page), PageBox::new(612.0, 792.0));
    }

    #[test]
    fn resources_are_copied_not_shared() {
        let (mut doc, first, _, shared_res) = tree_doc();
        let image = doc.add_object(dictionary! {});
        let name = add_page_resource(&mut doc, first, b"XObject", "OvIm", image).unwrap();
        assert_eq!(name, "OvIm1");

        let page = doc.get_object(first).unwrap().as_dict().unwrap();
        let res = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(res.has(b"Font"));
        let xobjects = res.get(b"XObject").unwrap().as_dict().unwrap();
        assert_eq!(xobjects.get(b"OvIm1").unwrap().as_reference().unwrap(), image);

        let shared = doc.get_object(shared_res).unwrap().as_dict().unwrap();
        let shared_x = shared.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(!shared_x.has(b"OvIm1"));
    }

    #[test]
    fn existing_content_is_isolated() {
        let (mut doc, first, second, _) = tree_doc();
        append_page_content(&mut doc, first, b"/OvIm0 Do\n".to_vec()).unwrap();
        let page = doc.get_object(first).unwrap().as_dict().unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);
        let head = doc.get_object(contents[0].as_reference().unwrap()).unwrap();
        assert_eq!(head.as_stream().unwrap().content, b"q\n");
        let tail = doc.get_object(contents[2].as_reference().unwrap()).unwrap();
        assert_eq!(tail.as_stream().unwrap().content, b"\nQ\n/OvIm0 Do\n");

        // The original stream ends in "S" with no newline; the restore must
        // still tokenise apart when a reader joins the streams.
        let joined = doc.get_page_content(first).unwrap();
        assert!(String::from_utf8(joined).unwrap().contains("l S\n\nQ\n"));

        append_page_content(&mut doc, second, b"x".to_vec()).unwrap();
        let page = doc.get_object(second).unwrap().as_dict().unwrap();
        assert_eq!(page.get(b"Contents").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(load(b"not a pdf at all"), Err(StampError::Decode(_))));
        assert!(matches!(page_count(b""), Err(StampError::Decode(_))));
    }
}
