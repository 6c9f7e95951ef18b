//! 文件系统内部的路径都是以 `/` 分隔的绝对路径。
//! 连续的 `/` 与末尾的 `/` 不产生空的路径项。

pub trait Path: ToOwned {
    fn is_absolute(&self) -> bool;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// 是否指向根目录（`/`、`//` 等）
    fn is_root(&self) -> bool;

    /// 依次给出非空的路径项
    fn components(&self) -> impl DoubleEndedIterator<Item = &Self>;

    /// Returns the final component of the Path, if there is one.
    ///
    /// Returns [`None`] for the root or the empty string.
    fn file_name(&self) -> Option<&Self>;

    /// 返回路径的`(父目录, 文件名)`，根目录没有父目录
    fn parent_file(&self) -> Option<(&Self, &Self)>;

    /// 返回不以`/`结束、不包含相对项的绝对路径。
    ///
    /// # 参数
    ///
    /// `cwd`: 当前工作目录，为绝对路径。
    ///
    /// 越过根目录的 `..` 使结果为 `None`。
    fn canonicalize(&self, cwd: &Self) -> Option<Self::Owned>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn is_root(&self) -> bool {
        self.is_absolute() && self.components().next().is_none()
    }

    fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.split('/').filter(|cmp| !cmp.is_empty())
    }

    fn file_name(&self) -> Option<&str> {
        self.components().next_back()
    }

    fn parent_file(&self) -> Option<(&str, &str)> {
        let trimmed = self.trim_end_matches('/');
        let (parent, file) = trimmed.rsplit_once('/')?;
        if file.is_empty() {
            return None;
        }
        let parent = parent.trim_end_matches('/');
        Some((if parent.is_empty() { "/" } else { parent }, file))
    }

    fn canonicalize(&self, cwd: &str) -> Option<String> {
        let mut cmps = Vec::new();
        if self.is_relative() {
            cmps.extend(cwd.components());
        }

        for cmp in self.components() {
            match cmp {
                ".." => {
                    cmps.pop()?;
                }
                "." => (),
                s => cmps.push(s),
            }
        }

        Some(format!("/{}", cmps.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::Path;

    #[test]
    fn parent_file() {
        assert_eq!("/a".parent_file(), Some(("/", "a")));
        assert_eq!("/a/b.txt".parent_file(), Some(("/a", "b.txt")));
        assert_eq!("/a/b/".parent_file(), Some(("/a", "b")));
        assert_eq!("//a//b".parent_file(), Some(("//a", "b")));
        assert_eq!("/".parent_file(), None);
        assert_eq!("a".parent_file(), None);
    }

    #[test]
    fn components() {
        assert_eq!("//a//b/".components().collect::<Vec<_>>(), ["a", "b"]);
        assert!("/".is_root());
        assert!("//".is_root());
        assert!(!"/a".is_root());
        assert_eq!("/a/b".file_name(), Some("b"));
        assert_eq!("/".file_name(), None);
    }

    #[test]
    fn canonicalize() {
        assert_eq!("b".canonicalize("/a").as_deref(), Some("/a/b"));
        assert_eq!("../c".canonicalize("/a/b").as_deref(), Some("/a/c"));
        assert_eq!("/x/./y/..".canonicalize("/a").as_deref(), Some("/x"));
        assert_eq!(".".canonicalize("/").as_deref(), Some("/"));
        assert_eq!("..".canonicalize("/").as_deref(), None);
    }
}
