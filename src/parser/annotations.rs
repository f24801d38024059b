use crate::models::{EntityKind, ParseLineError, VfxTag};
use crate::utils::{BreakdownConstants, PatternLibrary, ANNOTATION_REGEX};

/// 从一行中提取出的标注信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineAnnotations {
    /// 去掉VFX标注和实体声明后的文本，保留行首缩进
    pub text: String,
    /// 本行所有VFX标注按顺序合并的结果
    pub vfx: Option<VfxTag>,
    /// `[[type Name1, Name2]]` 声明的实体
    pub declarations: Vec<(String, EntityKind)>,
    /// `**Name**[[type]]` 内联标记的实体
    pub inline: Vec<(String, EntityKind)>,
    /// 原行有内容，但去掉标注后为空
    pub annotation_only: bool,
}

fn entity_kind(line_no: usize, kind: &str, annotation: &str) -> Result<EntityKind, ParseLineError> {
    kind.parse::<EntityKind>()
        .map_err(|_| ParseLineError::MalformedAnnotation {
            line: line_no,
            annotation: annotation.to_string(),
        })
}

/// 提取一行中的VFX标注和实体标注
///
/// VFX标注和实体声明从文本中删除，内联实体标记和自由注释保留在文本里。
/// 以保留关键字开头却无法识别的 `[[...]]` 会使整行出错
pub fn extract_annotations(
    line_no: usize,
    line: &str,
    patterns: &PatternLibrary,
) -> Result<LineAnnotations, ParseLineError> {
    let (text, tags) = patterns.extract_vfx(line);
    let vfx = tags
        .into_iter()
        .fold(None, |current, tag| Some(VfxTag::merge(current, tag)));

    let mut declarations = Vec::new();
    for caps in ANNOTATION_REGEX["declaration"].captures_iter(&text) {
        let kind = entity_kind(line_no, &caps["kind"], &caps[0])?;
        let names: Vec<&str> = caps["names"]
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ParseLineError::MalformedAnnotation {
                line: line_no,
                annotation: caps[0].to_string(),
            });
        }
        declarations.extend(names.into_iter().map(|name| (name.to_string(), kind)));
    }
    let text = if declarations.is_empty() {
        text
    } else {
        ANNOTATION_REGEX["declaration"]
            .replace_all(&text, "")
            .trim_end()
            .to_string()
    };

    let mut inline = Vec::new();
    for caps in ANNOTATION_REGEX["inline_entity"].captures_iter(&text) {
        let kind = entity_kind(line_no, &caps["kind"], &caps[0])?;
        inline.push((caps["name"].trim().to_string(), kind));
    }

    // 剩下的保留关键字标注都无法识别
    let unmarked = ANNOTATION_REGEX["inline_entity"].replace_all(&text, "");
    for caps in ANNOTATION_REGEX["bracket"].captures_iter(&unmarked) {
        let body = &caps["body"];
        if !BreakdownConstants::is_reserved(body) {
            continue;
        }
        let annotation = caps[0].to_string();
        let is_vfx = body
            .split_whitespace()
            .next()
            .map_or(false, |word| word.eq_ignore_ascii_case("vfx"));
        return Err(if is_vfx {
            ParseLineError::UnknownVfxLevel { line: line_no, annotation }
        } else {
            ParseLineError::MalformedAnnotation { line: line_no, annotation }
        });
    }

    let annotation_only = !line.trim().is_empty() && text.trim().is_empty();
    Ok(LineAnnotations {
        text,
        vfx,
        declarations,
        inline,
        annotation_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VfxLevel;

    fn patterns() -> PatternLibrary {
        PatternLibrary::new(&VfxLevel::defaults())
    }

    #[test]
    fn strips_vfx_and_keeps_marks() {
        let found = extract_annotations(
            0,
            "    **Rex**[[char]] fires. [[vfx easy]] [[vfx 3 hard]]",
            &patterns(),
        )
        .unwrap();
        assert_eq!(found.text, "    **Rex**[[char]] fires.");
        assert_eq!(found.vfx, Some(VfxTag::with_shot("3", "hard")));
        assert_eq!(found.inline, vec![("Rex".to_string(), EntityKind::Char)]);
        assert!(!found.annotation_only);
    }

    #[test]
    fn declaration_line_is_annotation_only() {
        let found = extract_annotations(0, "[[prop Gun, Crate ]]", &patterns()).unwrap();
        assert!(found.annotation_only);
        assert_eq!(
            found.declarations,
            vec![
                ("Gun".to_string(), EntityKind::Prop),
                ("Crate".to_string(), EntityKind::Prop)
            ]
        );
    }

    #[test]
    fn unknown_level_is_an_error() {
        let err = extract_annotations(2, "Boom. [[vfx insane]]", &patterns()).unwrap_err();
        assert_eq!(
            err,
            ParseLineError::UnknownVfxLevel {
                line: 2,
                annotation: "[[vfx insane]]".to_string()
            }
        );
    }

    #[test]
    fn bare_reserved_keyword_is_malformed() {
        let err = extract_annotations(1, "He grabs it [[char ]]", &patterns()).unwrap_err();
        assert!(matches!(err, ParseLineError::MalformedAnnotation { line: 1, .. }));
    }

    #[test]
    fn free_notes_pass_through() {
        let found = extract_annotations(0, "A crate. [[ask props]]", &patterns()).unwrap();
        assert_eq!(found.text, "A crate. [[ask props]]");
        assert!(found.vfx.is_none());
    }
}
