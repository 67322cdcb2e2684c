//! Register assignment for captured resources.

use crate::field::{ClassifiedField, ClassifiedKind};
use crate::hlsl::ResourceCategory;

/// One entry of the resource descriptor table: which register category a
/// resource binds to and its offset within that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceCategory,
    pub register_offset: u32,
}

/// The ordered resource binding table, one entry per resource in declaration
/// order (implicit output texture first when present).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceDescriptorTable {
    pub descriptors: Vec<ResourceDescriptor>,
}

impl ResourceDescriptorTable {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter()
    }
}

/// Assigns register offsets to resources in declaration order.
///
/// Each category counts independently: `b0` is reserved for the root
/// constants buffer so constant buffer views start at 1, while read-only and
/// read-write views start at 0. A pixel-shader-like shader's implicit output
/// texture is prepended and consumes `u0`.
pub fn allocate_resource_descriptors(
    classified: &[ClassifiedField],
    is_implicit_texture_used: bool,
) -> ResourceDescriptorTable {
    let mut constant_buffer_offset = 1u32;
    let mut read_only_offset = 0u32;
    let mut read_write_offset = 0u32;
    let mut descriptors = Vec::new();

    let mut allocate = |category: ResourceCategory| {
        let offset = match category {
            ResourceCategory::ConstantBufferView => &mut constant_buffer_offset,
            ResourceCategory::ReadOnlyView => &mut read_only_offset,
            ResourceCategory::ReadWriteView => &mut read_write_offset,
        };
        let register_offset = *offset;
        *offset += 1;

        ResourceDescriptor {
            kind: category,
            register_offset,
        }
    };

    if is_implicit_texture_used {
        descriptors.push(allocate(ResourceCategory::ReadWriteView));
    }

    for field in classified {
        if let ClassifiedKind::Resource(kind) = field.kind {
            descriptors.push(allocate(kind.category()));
        }
    }

    ResourceDescriptorTable { descriptors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ClassifiedField, ClassifiedKind, FieldPath};
    use crate::hlsl::ResourceKind;

    fn resource(kind: ResourceKind) -> ClassifiedField {
        ClassifiedField {
            path: FieldPath::root().child("r"),
            kind: ClassifiedKind::Resource(kind),
            starts_aggregate: false,
        }
    }

    #[test]
    fn categories_count_independently() {
        let classified = vec![
            resource(ResourceKind::ReadOnlyBuffer),
            resource(ResourceKind::ConstantBuffer),
            resource(ResourceKind::ReadWriteTexture2D),
            resource(ResourceKind::ReadOnlyTexture2D),
            resource(ResourceKind::ReadWriteBuffer),
        ];
        let table = allocate_resource_descriptors(&classified, false);

        let expected = [
            (ResourceCategory::ReadOnlyView, 0),
            (ResourceCategory::ConstantBufferView, 1),
            (ResourceCategory::ReadWriteView, 0),
            (ResourceCategory::ReadOnlyView, 1),
            (ResourceCategory::ReadWriteView, 1),
        ];
        assert_eq!(table.len(), expected.len());
        for (descriptor, (kind, register_offset)) in table.iter().zip(expected) {
            assert_eq!(descriptor.kind, kind);
            assert_eq!(descriptor.register_offset, register_offset);
        }
    }

    #[test]
    fn constant_buffer_views_start_after_the_root_constants() {
        let classified = vec![resource(ResourceKind::ConstantBuffer)];
        let table = allocate_resource_descriptors(&classified, false);

        assert_eq!(table.descriptors[0].register_offset, 1);
    }

    #[test]
    fn implicit_texture_takes_u0_first() {
        let classified = vec![resource(ResourceKind::ReadWriteBuffer)];
        let table = allocate_resource_descriptors(&classified, true);

        assert_eq!(
            table.descriptors[0],
            ResourceDescriptor {
                kind: ResourceCategory::ReadWriteView,
                register_offset: 0,
            }
        );
        assert_eq!(
            table.descriptors[1],
            ResourceDescriptor {
                kind: ResourceCategory::ReadWriteView,
                register_offset: 1,
            }
        );
    }

    #[test]
    fn offsets_within_a_category_are_contiguous() {
        let classified: Vec<_> = (0..5).map(|_| resource(ResourceKind::ReadOnlyBuffer)).collect();
        let table = allocate_resource_descriptors(&classified, false);

        let offsets: Vec<u32> = table.iter().map(|d| d.register_offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn non_resource_fields_are_ignored() {
        use crate::hlsl::{HlslType, ScalarKind};

        let classified = vec![ClassifiedField {
            path: FieldPath::root().child("scale"),
            kind: ClassifiedKind::Primitive(HlslType::Scalar(ScalarKind::Float)),
            starts_aggregate: false,
        }];
        let table = allocate_resource_descriptors(&classified, false);

        assert!(table.is_empty());
    }
}
