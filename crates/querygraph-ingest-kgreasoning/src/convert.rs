//! Shape converters.
//!
//! One converter per `QueryShape`. Each fills a fresh builder with the
//! shape's fixed number of triples and fixed diameter. Chain join points get
//! sequential variables (`?var0`, `?var1`, ...), reused on both sides of the
//! join; intersection branches share the node they meet at and add no
//! variables of their own. Answers are attached afterwards.

use crate::polarity::set_triple;
use crate::ImportError;
use querygraph_builder::{BuilderFactory, QueryBuilder};
use querygraph_dsl::{QueryShape, ShapeInstance, ShapedQuery};
use querygraph_mapping::{EntityMapper, RelationMapper};

/// Per-query variable counter.
#[derive(Debug, Default)]
struct Variables {
    next: u32,
}

impl Variables {
    fn fresh(&mut self) -> String {
        let name = EntityMapper::variable_name(self.next);
        self.next += 1;
        name
    }
}

/// Writes edges in order, assigning triple indices.
struct Edges<'b, 'm, B> {
    builder: &'b mut B,
    relations: &'m RelationMapper,
    next: usize,
}

impl<B: QueryBuilder> Edges<'_, '_, B> {
    fn push(&mut self, subject: &str, relation: u32, object: &str) -> Result<(), ImportError> {
        set_triple(self.builder, self.relations, self.next, subject, relation, object)?;
        self.next += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeConverter<'a> {
    entities: &'a EntityMapper,
    relations: &'a RelationMapper,
}

impl<'a> ShapeConverter<'a> {
    pub fn new(entities: &'a EntityMapper, relations: &'a RelationMapper) -> Self {
        Self {
            entities,
            relations,
        }
    }

    pub fn entities(&self) -> &'a EntityMapper {
        self.entities
    }

    /// Decode `instance` as `shape` and emit its triples and diameter.
    pub fn convert<F: BuilderFactory>(
        &self,
        factory: &F,
        shape: QueryShape,
        instance: &ShapeInstance,
    ) -> Result<F::Builder, ImportError> {
        let query = shape.decode(instance)?;
        let mut builder = factory.builder(shape.num_triples(), 0);
        builder.set_diameter(shape.diameter())?;
        let written = self.emit(&query, &mut builder)?;
        debug_assert_eq!(written, shape.num_triples());
        Ok(builder)
    }

    fn anchor(&self, id: u32) -> Result<&'a str, ImportError> {
        Ok(self.entities.inverse_lookup(id)?)
    }

    fn emit<B: QueryBuilder>(&self, query: &ShapedQuery, builder: &mut B) -> Result<usize, ImportError> {
        let target = EntityMapper::target_entity_name();
        let mut vars = Variables::default();
        let mut edges = Edges {
            builder,
            relations: self.relations,
            next: 0,
        };

        match *query {
            ShapedQuery::OneHop { anchor, relation } => {
                edges.push(self.anchor(anchor)?, relation, target)?;
            }
            ShapedQuery::TwoHop {
                anchor,
                relations: [r0, r1],
            } => {
                let v0 = vars.fresh();
                edges.push(self.anchor(anchor)?, r0, &v0)?;
                edges.push(&v0, r1, target)?;
            }
            ShapedQuery::ThreeHop {
                anchor,
                relations: [r0, r1, r2],
            } => {
                let v0 = vars.fresh();
                let v1 = vars.fresh();
                edges.push(self.anchor(anchor)?, r0, &v0)?;
                edges.push(&v0, r1, &v1)?;
                edges.push(&v1, r2, target)?;
            }
            ShapedQuery::TwoIntersection { branches } => {
                for (anchor, relation) in branches {
                    edges.push(self.anchor(anchor)?, relation, target)?;
                }
            }
            ShapedQuery::ThreeIntersection { branches } => {
                for (anchor, relation) in branches {
                    edges.push(self.anchor(anchor)?, relation, target)?;
                }
            }
            ShapedQuery::IntersectionThenHop { branches, relation } => {
                let v0 = vars.fresh();
                for (anchor, r) in branches {
                    edges.push(self.anchor(anchor)?, r, &v0)?;
                }
                edges.push(&v0, relation, target)?;
            }
            ShapedQuery::HopThenIntersection {
                chain: (chain_anchor, [r0, r1]),
                branch: (branch_anchor, r2),
            } => {
                let v0 = vars.fresh();
                edges.push(self.anchor(chain_anchor)?, r0, &v0)?;
                edges.push(&v0, r1, target)?;
                edges.push(self.anchor(branch_anchor)?, r2, target)?;
            }
        }

        Ok(edges.next)
    }
}
