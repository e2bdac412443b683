//! Deep path updates: bars, routes, materialized containers.

mod common;

use common::*;
use tuple_update::prelude::*;

fn run(fields: Vec<Val>, op_list: Vec<Val>) -> Result<Vec<u8>, UpdateError> {
    update(&tuple(fields), &ops(op_list), IndexBase::One, &NoNames)
}

fn nested() -> Vec<Val> {
    vec![
        u(100),
        m(vec![
            ("a", m(vec![("b", u(1)), ("c", a(vec![u(10), u(20), u(30)]))])),
            ("z", u(2)),
        ]),
        u(200),
    ]
}

#[test]
fn deep_set_in_array() {
    let new = run(nested(), vec![a(vec![s("="), s("[2].a.c[2]"), u(21)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                ("a", m(vec![("b", u(1)), ("c", a(vec![u(10), u(21), u(30)]))])),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );
}

#[test]
fn deep_arith_bit_and_splice() {
    let fields = vec![m(vec![("n", u(40)), ("s", s("hello")), ("b", u(0b1100))])];
    let new = run(
        fields,
        vec![
            a(vec![s("+"), s("[1].n"), u(2)]),
            a(vec![s(":"), s("[1].s"), u(6), u(0), s(" world")]),
            a(vec![s("^"), s("[1].b"), u(0b0101)]),
        ],
    )
    .unwrap();
    assert_eq!(
        new,
        tuple(vec![m(vec![
            ("n", u(42)),
            ("s", s("hello world")),
            ("b", u(0b1001)),
        ])])
    );
}

#[test]
fn deep_insert_into_array() {
    let new = run(nested(), vec![a(vec![s("!"), s("[2].a.c[2]"), u(15)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                (
                    "a",
                    m(vec![("b", u(1)), ("c", a(vec![u(10), u(15), u(20), u(30)]))]),
                ),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );

    // Appending just past the end is allowed for insert.
    let new = run(nested(), vec![a(vec![s("!"), s("[2].a.c[4]"), u(40)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                (
                    "a",
                    m(vec![("b", u(1)), ("c", a(vec![u(10), u(20), u(30), u(40)]))]),
                ),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );

    let err = run(nested(), vec![a(vec![s("!"), s("[2].a.c[6]"), u(0)])]).unwrap_err();
    assert_eq!(err, UpdateError::NoSuchFieldNo(6));
}

#[test]
fn deep_delete_from_array() {
    let new = run(nested(), vec![a(vec![s("#"), s("[2].a.c[1]"), u(2)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                ("a", m(vec![("b", u(1)), ("c", a(vec![u(30)]))])),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );

    let err = run(nested(), vec![a(vec![s("#"), s("[2].a.c[2]"), u(3)])]).unwrap_err();
    assert_eq!(err, UpdateError::NoSuchFieldNo(2));
}

#[test]
fn set_on_missing_map_key_inserts_it() {
    let new = run(nested(), vec![a(vec![s("="), s("[2].a.d"), u(7)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                (
                    "a",
                    m(vec![
                        ("d", u(7)),
                        ("b", u(1)),
                        ("c", a(vec![u(10), u(20), u(30)])),
                    ]),
                ),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );
}

#[test]
fn insert_into_map_requires_a_fresh_key() {
    let new = run(nested(), vec![a(vec![s("!"), s("[2].y"), u(9)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                ("y", u(9)),
                ("a", m(vec![("b", u(1)), ("c", a(vec![u(10), u(20), u(30)]))])),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );

    let err = run(nested(), vec![a(vec![s("!"), s("[2].z"), u(9)])]).unwrap_err();
    assert_eq!(
        err,
        UpdateError::Field {
            opcode: '!',
            field: FieldRef::Name("z".into()),
            reason: "the key exists already",
        }
    );
}

#[test]
fn delete_from_map_only_one_at_a_time() {
    let new = run(nested(), vec![a(vec![s("#"), s("[2].z"), u(1)])]).unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![(
                "a",
                m(vec![("b", u(1)), ("c", a(vec![u(10), u(20), u(30)]))]),
            )]),
            u(200),
        ])
    );

    let err = run(nested(), vec![a(vec![s("#"), s("[2].z"), u(2)])]).unwrap_err();
    assert_eq!(
        err,
        UpdateError::Field {
            opcode: '#',
            field: FieldRef::Name("z".into()),
            reason: "can delete only 1 field from a map in a row",
        }
    );
}

#[test]
fn quoted_keys_address_awkward_names() {
    let fields = vec![m(vec![("k.x", u(1)), ("it's", u(2))])];
    let new = run(
        fields,
        vec![
            a(vec![s("="), s("[1][\"k.x\"]"), u(10)]),
            a(vec![s("="), s("[1]['it\\'s']"), u(20)]),
        ],
    )
    .unwrap();
    assert_eq!(new, tuple(vec![m(vec![("k.x", u(10)), ("it's", u(20))])]));
}

#[test]
fn two_ops_diverging_in_a_map_share_the_prefix() {
    let new = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.b"), u(11)]),
            a(vec![s("="), s("[2].a.d"), u(12)]),
        ],
    )
    .unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                (
                    "a",
                    m(vec![
                        ("d", u(12)),
                        ("b", u(11)),
                        ("c", a(vec![u(10), u(20), u(30)])),
                    ]),
                ),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );
}

#[test]
fn three_ops_in_one_container() {
    let new = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.c[1]"), u(11)]),
            a(vec![s("+"), s("[2].a.c[2]"), u(1)]),
            a(vec![s("#"), s("[2].a.c[3]"), u(1)]),
        ],
    )
    .unwrap();
    assert_eq!(
        new,
        tuple(vec![
            u(100),
            m(vec![
                ("a", m(vec![("b", u(1)), ("c", a(vec![u(11), u(21)]))])),
                ("z", u(2)),
            ]),
            u(200),
        ])
    );
}

#[test]
fn routes_split_at_shallower_divergence() {
    let fields = vec![m(vec![(
        "a",
        m(vec![
            ("b", m(vec![("c", u(1)), ("d", u(2))])),
            ("e", u(3)),
        ]),
    )])];
    // The first two ops share [1].a.b and build a route; the third diverges
    // higher, at [1].a.
    let new = run(
        fields,
        vec![
            a(vec![s("="), s("[1].a.b.c"), u(10)]),
            a(vec![s("="), s("[1].a.b.d"), u(20)]),
            a(vec![s("="), s("[1].a.e"), u(30)]),
        ],
    )
    .unwrap();
    assert_eq!(
        new,
        tuple(vec![m(vec![(
            "a",
            m(vec![
                ("b", m(vec![("c", u(10)), ("d", u(20))])),
                ("e", u(30)),
            ]),
        )])])
    );
}

#[test]
fn bar_bytes_match_the_materialized_path() {
    // A lone deep op stays a bar; adding a sibling op that rewrites its own
    // old value forces full materialization. Both must emit identical bytes.
    let lone = run(nested(), vec![a(vec![s("="), s("[2].a.c[2]"), u(21)])]).unwrap();
    let materialized = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.c[1]"), u(10)]),
            a(vec![s("="), s("[2].a.c[2]"), u(21)]),
        ],
    )
    .unwrap();
    assert_eq!(lone, materialized);

    // Same check for a map insert.
    let lone = run(nested(), vec![a(vec![s("="), s("[2].a.d"), u(7)])]).unwrap();
    let materialized = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.b"), u(1)]),
            a(vec![s("="), s("[2].a.d"), u(7)]),
        ],
    )
    .unwrap();
    assert_eq!(lone, materialized);
}

#[test]
fn overlapping_paths_are_double_updates() {
    // Exact same leaf.
    let err = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.b"), u(1)]),
            a(vec![s("+"), s("[2].a.b"), u(1)]),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, UpdateError::DoubleUpdate { opcode: '+', .. }));

    // One path is a prefix of the other.
    let err = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.b"), u(1)]),
            a(vec![s("="), s("[2].a"), u(1)]),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, UpdateError::DoubleUpdate { .. }));

    let err = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a"), u(1)]),
            a(vec![s("="), s("[2].a.b"), u(1)]),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, UpdateError::DoubleUpdate { .. }));

    // A whole-field op over a field with a deep update inside.
    let err = run(
        nested(),
        vec![
            a(vec![s("="), s("[2].a.b"), u(1)]),
            a(vec![s("="), u(2), u(1)]),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, UpdateError::DoubleUpdate { .. }));
}

#[test]
fn path_type_mismatches() {
    // Key subscript into an array.
    let err = run(nested(), vec![a(vec![s("="), s("[2].a.c.x"), u(0)])]).unwrap_err();
    assert!(matches!(
        err,
        UpdateError::BadType {
            opcode: '=',
            expected: "a map",
            ..
        }
    ));

    // Index subscript into a map.
    let err = run(nested(), vec![a(vec![s("="), s("[2].a[1]"), u(0)])]).unwrap_err();
    assert!(matches!(
        err,
        UpdateError::BadType {
            opcode: '=',
            expected: "an array",
            ..
        }
    ));

    // Descending through a scalar.
    let err = run(nested(), vec![a(vec![s("="), s("[2].z.q"), u(0)])]).unwrap_err();
    assert_eq!(err, UpdateError::NoSuchFieldName("q".into()));

    // Missing key with a non-inserting op.
    let err = run(nested(), vec![a(vec![s("+"), s("[2].a.nope"), u(1)])]).unwrap_err();
    assert_eq!(err, UpdateError::NoSuchFieldName("nope".into()));
}

#[test]
fn wildcard_is_rejected() {
    let err = run(nested(), vec![a(vec![s("="), s("[2].a.c[*]"), u(0)])]).unwrap_err();
    assert!(matches!(err, UpdateError::Field { reason, .. }
        if reason.contains("wildcard")));
}

#[test]
fn malformed_path_reports_its_position() {
    let err = run(nested(), vec![a(vec![s("="), s("[2].a..b"), u(0)])]).unwrap_err();
    assert!(matches!(err, UpdateError::BadJson { opcode: '=', pos: 7, .. }));
}

#[test]
fn untouched_tail_is_copied_verbatim() {
    // Only field 1 is touched; the big trailing structure must come out
    // byte-identical.
    let mut fields = vec![u(1)];
    for i in 0..40 {
        fields.push(m(vec![("x", a(vec![u(i), s("payload"), Val::Nil]))]));
    }
    let before = tuple(fields.clone());
    let new = run(fields, vec![a(vec![s("="), u(1), u(2)])]).unwrap();
    // array16 header (3 bytes), then the one-byte first field.
    assert_eq!(new[..3], before[..3]);
    assert_eq!((before[3], new[3]), (0x01, 0x02));
    assert_eq!(&new[4..], &before[4..]);
}
